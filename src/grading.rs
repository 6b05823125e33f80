//! Relevance grading: is the retrieved context enough to answer the query?
//!
//! Graders are total. Empty context is always insufficient, and a grading
//! collaborator failure degrades to insufficient with a "grader unavailable"
//! rationale instead of propagating; the controller always has a safe path
//! forward.

use crate::errors::Result;
use crate::llm::{CompletionOptions, LlmClient};
use crate::types::{Chunk, Verdict};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Classifies a (query, chunk-set) pair as sufficient or insufficient.
#[async_trait]
pub trait RelevanceGrader: Send + Sync {
    /// Total: never fails, never blocks the controller's degraded path.
    async fn grade(&self, query: &str, chunks: &[Chunk]) -> Verdict;
}

/// Pure term-overlap heuristic: the fraction of content-bearing query terms
/// that appear somewhere in the retrieved text.
pub struct LexicalGrader {
    /// Overlap ratio in [0, 1] above which context is sufficient
    threshold: f32,
}

impl LexicalGrader {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    fn overlap_ratio(query: &str, chunks: &[Chunk]) -> f32 {
        let query_terms: HashSet<String> = content_terms(query).collect();
        if query_terms.is_empty() {
            return 0.0;
        }

        let context_terms: HashSet<String> = chunks
            .iter()
            .flat_map(|c| content_terms(&c.text))
            .collect();

        let matched = query_terms
            .iter()
            .filter(|t| context_terms.contains(*t))
            .count();
        matched as f32 / query_terms.len() as f32
    }
}

impl Default for LexicalGrader {
    fn default() -> Self {
        Self::new(0.3)
    }
}

#[async_trait]
impl RelevanceGrader for LexicalGrader {
    async fn grade(&self, query: &str, chunks: &[Chunk]) -> Verdict {
        if chunks.is_empty() {
            return Verdict::insufficient("no context retrieved");
        }

        let ratio = Self::overlap_ratio(query, chunks);
        if ratio >= self.threshold {
            Verdict::Sufficient
        } else {
            Verdict::insufficient(format!(
                "only {:.0}% of query terms covered by retrieved context",
                ratio * 100.0
            ))
        }
    }
}

/// Lowercased alphanumeric terms longer than three characters. Short words
/// are treated as stopwords.
fn content_terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
}

/// Model-backed grader: asks the LLM for a yes/no relevance judgment.
pub struct LlmGrader {
    client: Arc<dyn LlmClient>,
}

impl LlmGrader {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    fn build_prompt(query: &str, chunks: &[Chunk]) -> String {
        let context: Vec<String> = chunks
            .iter()
            .map(|c| format!("- {}", c.text.trim()))
            .collect();
        format!(
            "You are grading retrieved context for a question.\n\
             Question: {}\n\
             Context:\n{}\n\
             Does the context contain enough information to answer the \
             question? Reply with exactly YES or NO.",
            query,
            context.join("\n")
        )
    }
}

#[async_trait]
impl RelevanceGrader for LlmGrader {
    async fn grade(&self, query: &str, chunks: &[Chunk]) -> Verdict {
        if chunks.is_empty() {
            return Verdict::insufficient("no context retrieved");
        }

        let options = CompletionOptions {
            temperature: 0.0,
            max_tokens: 8,
            stop: Vec::new(),
        };

        match self
            .client
            .complete(&Self::build_prompt(query, chunks), &options)
            .await
        {
            Ok(reply) => {
                if reply.trim().to_uppercase().starts_with("YES") {
                    Verdict::Sufficient
                } else {
                    Verdict::insufficient("model judged context insufficient")
                }
            }
            Err(e) => {
                warn!(error = %e, "grading collaborator failed; degrading");
                Verdict::insufficient("grader unavailable")
            }
        }
    }
}

/// Build the configured grader.
pub fn grader_from_config(
    kind: &str,
    threshold: f32,
    client: Arc<dyn LlmClient>,
) -> Result<Arc<dyn RelevanceGrader>> {
    match kind {
        "llm" => Ok(Arc::new(LlmGrader::new(client))),
        _ => Ok(Arc::new(LexicalGrader::new(threshold))),
    }
}
