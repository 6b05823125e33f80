//! In-process vector index with brute-force cosine search.
//!
//! Entries live in a `HashMap` behind a `tokio::sync::RwLock`: reads run
//! concurrently with each other, writes are serialized, and a reader never
//! sees a partially-written vector because the map entry is replaced whole.

use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use crate::types::{Chunk, EmbeddedChunk};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct IndexState {
    entries: HashMap<String, (Vec<f32>, Chunk)>,
    /// Pinned by the first upsert
    dimension: Option<usize>,
}

/// Brute-force in-memory index, the default backend for tests and small
/// corpora.
#[derive(Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()> {
        let mut state = self.state.write().await;

        if let Some(dim) = state.dimension {
            if dim != chunk.dimension {
                return Err(RagError::Embedding(format!(
                    "Dimension mismatch: index holds {}-d vectors, got {}-d",
                    dim, chunk.dimension
                )));
            }
        } else {
            state.dimension = Some(chunk.dimension);
        }

        state.entries.insert(
            chunk.chunk.id.clone(),
            (chunk.vector.clone(), chunk.chunk.clone()),
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>> {
        let state = self.state.read().await;

        let mut scored: Vec<(Chunk, f32)> = state
            .entries
            .values()
            .map(|(v, chunk)| (chunk.clone(), cosine_similarity(vector, v)))
            .collect();

        // Descending score, ascending id for equal scores.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.entries.remove(id);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.state.read().await.entries.len())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.state.read().await.dimension)
    }
}

/// Cosine similarity in [-1, 1]; zero vectors score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
