//! Retrieval engine: embed the query, rank neighbors, filter and truncate.

use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use crate::index::VectorIndex;
use crate::types::RetrievalResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Search parameters for retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of results to retrieve
    pub top_k: usize,
    /// Minimum similarity score; results below are dropped. Defaults to
    /// negative infinity, which keeps every hit.
    pub min_score: f32,
    /// When true, querying an empty index is an error instead of an empty
    /// result set
    pub strict_empty_index: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: f32::NEG_INFINITY,
            strict_empty_index: false,
        }
    }
}

/// Retrieval engine for semantic search
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    default_params: SearchParams,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            default_params: SearchParams::default(),
        }
    }

    /// Create with custom default parameters
    pub fn with_params(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        params: SearchParams,
    ) -> Self {
        Self {
            embedder,
            index,
            default_params: params,
        }
    }

    /// Retrieve chunks matching the query with default parameters.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let params = self.default_params.clone();
        self.retrieve_with_params(query, &params).await
    }

    /// Retrieve with custom parameters.
    ///
    /// Results are sorted descending by score; equal scores are broken by
    /// ascending chunk id, then truncated to `top_k`.
    pub async fn retrieve_with_params(
        &self,
        query: &str,
        params: &SearchParams,
    ) -> Result<Vec<RetrievalResult>> {
        if self.index.len().await? == 0 {
            if params.strict_empty_index {
                return Err(RagError::IndexEmpty);
            }
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;

        let mut hits = self
            .index
            .query(&vector, params.top_k)
            .await
            .map_err(|e| RagError::RetrievalFailure(e.to_string()))?;

        hits.retain(|(_, score)| *score >= params.min_score);
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        hits.truncate(params.top_k);

        debug!(query, hits = hits.len(), "retrieval complete");

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(rank, (chunk, score))| RetrievalResult { chunk, score, rank })
            .collect())
    }

    /// Get default search parameters
    pub fn default_params(&self) -> &SearchParams {
        &self.default_params
    }
}
