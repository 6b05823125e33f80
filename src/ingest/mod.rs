//! Document ingestion: format loaders and the overlapping chunker.

pub mod chunker;
pub mod loader;

pub use chunker::{split, ChunkIter};
pub use loader::{DocumentLoader, JsonLoader, TextLoader};
