//! ragpilot - agentic retrieval-augmented question answering
//!
//! Combines a document retrieval subsystem with a local generative model,
//! orchestrated by an agent that decides per step whether to retrieve,
//! rewrite the query, or answer:
//!
//! - **Ingestion**: loaders + overlapping chunker
//! - **Index**: opaque vector store behind `VectorIndex` (in-memory or Qdrant)
//! - **Agent loop**: retrieve -> grade -> (rewrite -> retrieve)* -> generate,
//!   bounded by a retry budget and a no-change safety net

pub mod errors;
pub mod types;
pub mod config;

// Ingestion and indexing
pub mod ingest;
pub mod embedding;
pub mod index;
pub mod indexer;

// Retrieval-augmented generation pipeline
pub mod retrieval;
pub mod grading;
pub mod rewrite;
pub mod generation;
pub mod llm;

// Agentic control loop and conversation persistence
pub mod agent;
pub mod session;

// CLI surface
pub mod cli;

// Re-export commonly used types
pub use errors::{RagError, Result};
pub use types::{Answer, Chunk, Citation, RetrievalResult, Turn, Verdict};
