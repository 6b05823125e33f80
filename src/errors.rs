//! Error taxonomy for the RAG agent.
//!
//! Collaborator failures (embedding, generation, retrieval) carry enough
//! context to be retried or surfaced; terminal controller failures always
//! report the state they failed in and the query that was in flight.

use thiserror::Error;

/// Main error type for the ragpilot system
#[derive(Error, Debug)]
pub enum RagError {
    /// Invalid parameters, fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Embedding collaborator failure (wrong dimension, transport error)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Generative model collaborator failure
    #[error("Generation error: {0}")]
    Generation(String),

    /// Vector index query failure
    #[error("Retrieval failure: {0}")]
    RetrievalFailure(String),

    /// Index contains no chunks and strict mode is enabled
    #[error("Vector index is empty")]
    IndexEmpty,

    /// Invalid user input, rejected before the controller starts
    #[error("Input error: {0}")]
    Input(String),

    /// Batch upsert rejected; no chunks from the batch were written
    #[error("Upsert batch rejected at chunk {chunk_id}: {reason}")]
    BatchRejected { chunk_id: String, reason: String },

    /// State machine transition errors
    #[error("Invalid state transition from {from:?} on {event:?}: {reason}")]
    InvalidTransition {
        from: String,
        event: String,
        reason: String,
    },

    /// Controller turn failed in a non-recoverable way
    #[error("Turn failed in state {state} (query: {working_query:?}): {source}")]
    TurnFailed {
        state: String,
        working_query: String,
        #[source]
        source: Box<RagError>,
    },

    /// Cooperative abort requested by the session owner
    #[error("Cancelled in state {state}")]
    Cancelled { state: String },

    /// Collaborator call exceeded the configured deadline
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Wrap a collaborator failure with the controller state and query it
    /// interrupted, for terminal reporting.
    pub fn in_state(self, state: &str, working_query: &str) -> Self {
        RagError::TurnFailed {
            state: state.to_string(),
            working_query: working_query.to_string(),
            source: Box::new(self),
        }
    }

    /// Stable error code surfaced to callers alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            RagError::Configuration(_) => "E_CONFIG",
            RagError::Embedding(_) => "E_EMBED",
            RagError::Generation(_) => "E_GENERATE",
            RagError::RetrievalFailure(_) => "E_RETRIEVE",
            RagError::IndexEmpty => "E_INDEX_EMPTY",
            RagError::Input(_) => "E_INPUT",
            RagError::BatchRejected { .. } => "E_BATCH_REJECTED",
            RagError::InvalidTransition { .. } => "E_TRANSITION",
            RagError::TurnFailed { .. } => "E_TURN_FAILED",
            RagError::Cancelled { .. } => "E_CANCELLED",
            RagError::Timeout { .. } => "E_TIMEOUT",
            RagError::Http(_) => "E_HTTP",
            RagError::Serialization(_) => "E_SERDE",
            RagError::Io(_) => "E_IO",
        }
    }
}

/// Convert anyhow errors at the binary boundary
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generation(err.to_string())
    }
}
