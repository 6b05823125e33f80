//! Vector index collaborator boundary.
//!
//! The storage engine is opaque: the rest of the system only sees
//! `VectorIndex`. `MemoryIndex` is the in-process default; `QdrantIndex`
//! adapts a running Qdrant instance to the same trait.

pub mod memory;
pub mod qdrant;

use crate::errors::Result;
use crate::types::{Chunk, EmbeddedChunk};
use async_trait::async_trait;

/// Opaque nearest-neighbor store keyed by chunk id.
///
/// `upsert` is idempotent per chunk id: re-upserting an id replaces its
/// vector and payload. Reads may proceed concurrently with writes but must
/// never observe a half-written vector.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace one embedded chunk.
    async fn upsert(&self, chunk: &EmbeddedChunk) -> Result<()>;

    /// Nearest neighbors by cosine similarity, best first. Returns at most
    /// `k` entries; an empty index yields an empty list.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>>;

    /// Remove a chunk by id. Removing an absent id is a no-op.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Number of chunks currently stored.
    async fn len(&self) -> Result<usize>;

    /// Dimension of stored vectors; `None` while the index is empty.
    async fn dimension(&self) -> Result<Option<usize>>;
}

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;
