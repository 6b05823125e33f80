//! Core data model: chunks, retrieval results, verdicts, turns, answers.
//!
//! Every type here is serde-serializable so turns can be persisted and
//! chunks can travel through vector-store payloads unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A document after format-specific loading: plain text plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// Full document text
    pub text: String,
    /// Document identifier (path, URL, table name)
    pub source: String,
    /// Loader-provided metadata
    pub metadata: HashMap<String, String>,
}

impl NormalizedDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            metadata: HashMap::new(),
        }
    }
}

/// A bounded span of source text with provenance, the unit of retrieval.
///
/// Immutable once created; retrieval results reference chunks by value but
/// never mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Opaque identifier, unique within the index
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Source document identifier
    pub source: String,
    /// Character offset of this chunk within the source text
    pub offset: usize,
    /// Length of the chunk text in characters
    pub length: usize,
    /// Provenance metadata inherited from the document
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source: impl Into<String>,
        offset: usize,
    ) -> Self {
        let text = text.into();
        let length = text.chars().count();
        Self {
            id: id.into(),
            text,
            source: source.into(),
            offset,
            length,
            metadata: HashMap::new(),
        }
    }
}

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    /// Must match the index dimension; checked before any upsert
    pub dimension: usize,
}

impl EmbeddedChunk {
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        let dimension = vector.len();
        Self {
            chunk,
            vector,
            dimension,
        }
    }
}

/// One retrieval hit: a chunk, its similarity score, and its rank.
///
/// Sequences of results are ordered descending by score; equal scores are
/// broken by ascending chunk id so retrieval output is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
    /// Position in the result list, 0-based
    pub rank: usize,
}

/// Relevance grading outcome for a (query, chunk-set) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Retrieved context is enough to answer the query
    Sufficient,
    /// Context is missing or off-topic; rewrite and retry
    Insufficient {
        /// Optional explanation, fed to the query rewriter
        rationale: Option<String>,
    },
}

impl Verdict {
    pub fn insufficient(rationale: impl Into<String>) -> Self {
        Verdict::Insufficient {
            rationale: Some(rationale.into()),
        }
    }

    pub fn is_sufficient(&self) -> bool {
        matches!(self, Verdict::Sufficient)
    }

    pub fn rationale(&self) -> Option<&str> {
        match self {
            Verdict::Sufficient => None,
            Verdict::Insufficient { rationale } => rationale.as_deref(),
        }
    }
}

/// Source attribution for a span of the generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub offset: usize,
}

/// A generated answer with its supporting citations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// One citation per context chunk that backed the answer, in prompt order
    pub citations: Vec<Citation>,
    /// Set when the answer was produced without sufficient context
    pub degraded: bool,
}

/// One completed user interaction. Append-only: never mutated after being
/// pushed onto the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub user_query: String,
    pub final_answer: String,
    /// Chunks that backed the final answer, in retrieval order
    pub retrieved_chunks: Vec<Chunk>,
    /// Grader verdicts across all retrieval attempts for this turn
    pub grading_verdicts: Vec<Verdict>,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(user_query: impl Into<String>, final_answer: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            final_answer: final_answer.into(),
            retrieved_chunks: Vec::new(),
            grading_verdicts: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}
