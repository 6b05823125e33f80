//! Embedding collaborator boundary.
//!
//! The embedding model is an opaque function text -> vector. The shipped
//! implementation calls Ollama's embeddings endpoint; tests substitute a
//! deterministic fake behind the same trait.

use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Request timeout for embedding calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opaque text-to-vector collaborator. Implementations must return vectors
/// of one fixed dimension; the first successful call pins it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding client backed by Ollama's `/api/embeddings` endpoint.
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    /// 0 until the first successful call pins the dimension
    dimension: AtomicUsize,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(RagError::Http)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            model: model.to_string(),
            dimension: AtomicUsize::new(0),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to parse response: {}", e)))?;

        let vector: Vec<f32> = parsed.embedding.iter().map(|v| *v as f32).collect();
        if vector.is_empty() {
            return Err(RagError::Embedding(
                "Collaborator returned an empty vector".to_string(),
            ));
        }

        // Dimension is pinned by the first call; any later mismatch is a
        // fatal misconfiguration (model swapped under a live index).
        let pinned = self.dimension.compare_exchange(
            0,
            vector.len(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if let Err(expected) = pinned {
            if expected != vector.len() {
                return Err(RagError::Embedding(format!(
                    "Dimension mismatch: expected {}, got {}",
                    expected,
                    vector.len()
                )));
            }
        }

        Ok(vector)
    }
}

/// Ollama embeddings request
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    prompt: String,
}

/// Ollama embeddings response
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}
