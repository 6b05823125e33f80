//! Semantic retrieval over the vector index.

pub mod engine;

pub use engine::{Retriever, SearchParams};
