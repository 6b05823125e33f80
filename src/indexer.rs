//! Indexer: embeds chunks and writes them to the vector index.
//!
//! Batches are all-or-nothing: every chunk is embedded and dimension-checked
//! before anything is written, so an embedding failure rejects the whole
//! batch and names the offending chunk id.

use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use crate::types::{Chunk, EmbeddedChunk};
use std::sync::Arc;
use tracing::{debug, info};

/// Owns writes to the index; retrieval reads the same index concurrently.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embed and upsert a batch of chunks. Idempotent per chunk id.
    ///
    /// No chunk is written until the entire batch has embedded successfully
    /// with a consistent dimension; the first failure rejects the batch.
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut embedded = Vec::with_capacity(chunks.len());
        let mut batch_dim: Option<usize> = self.index.dimension().await?;

        for chunk in chunks {
            let vector = self.embedder.embed(&chunk.text).await.map_err(|e| {
                RagError::BatchRejected {
                    chunk_id: chunk.id.clone(),
                    reason: e.to_string(),
                }
            })?;

            match batch_dim {
                Some(dim) if dim != vector.len() => {
                    return Err(RagError::BatchRejected {
                        chunk_id: chunk.id.clone(),
                        reason: format!(
                            "dimension mismatch: expected {}, got {}",
                            dim,
                            vector.len()
                        ),
                    });
                }
                None => batch_dim = Some(vector.len()),
                _ => {}
            }

            embedded.push(EmbeddedChunk::new(chunk.clone(), vector));
        }

        for chunk in &embedded {
            self.index.upsert(chunk).await?;
            debug!(chunk_id = %chunk.chunk.id, "indexed chunk");
        }

        info!(count = embedded.len(), "batch upserted");
        Ok(embedded.len())
    }

    /// Remove a chunk from the index.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.index.delete(id).await
    }

    /// Number of chunks currently indexed.
    pub async fn len(&self) -> Result<usize> {
        self.index.len().await
    }
}
