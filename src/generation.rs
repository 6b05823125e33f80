//! Answer generation over grounded context.
//!
//! The generator assembles a numbered context block from retrieved chunks,
//! asks the model to answer using only that context, and returns the answer
//! with one citation per included chunk. With no context it never asks the
//! model at all: it states that no supporting context was found.

use crate::errors::Result;
use crate::llm::{CompletionOptions, LlmClient};
use crate::types::{Answer, Chunk, Citation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Marker included verbatim in every answer produced without context.
pub const NO_CONTEXT_MARKER: &str = "No supporting context was found";

/// Disclaimer prefixed to degraded (low-confidence) answers.
pub const LOW_CONFIDENCE_DISCLAIMER: &str =
    "[low confidence: the retrieved context may not fully support this answer]";

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum tokens of retrieved context included in the prompt
    pub max_context_tokens: usize,
    /// Include similarity provenance lines in the context block
    pub include_provenance: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 2000,
            include_provenance: true,
        }
    }
}

/// Answer generator over the LLM collaborator.
pub struct AnswerGenerator {
    client: Arc<dyn LlmClient>,
    config: ContextConfig,
    options: CompletionOptions,
}

impl AnswerGenerator {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: ContextConfig::default(),
            options: CompletionOptions::default(),
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: ContextConfig) -> Self {
        Self {
            client,
            config,
            options: CompletionOptions::default(),
        }
    }

    /// Generate a grounded answer for `query` from `chunks`.
    ///
    /// Empty `chunks` short-circuits to the no-context answer with an empty
    /// citation list; the model is never asked to answer unsupported.
    pub async fn generate(&self, query: &str, chunks: &[Chunk]) -> Result<Answer> {
        if chunks.is_empty() {
            return Ok(Answer {
                text: format!(
                    "{} for this question, so no answer can be given: {}",
                    NO_CONTEXT_MARKER, query
                ),
                citations: Vec::new(),
                degraded: true,
            });
        }

        let (context_block, included) = self.assemble_context(chunks);
        let prompt = format!(
            "Answer the question using only the numbered sources below. \
             Cite sources inline as [1], [2], etc. If the sources do not \
             contain the answer, say so.\n\n{}\nQuestion: {}\nAnswer:",
            context_block, query
        );

        debug!(sources = included.len(), "generating answer");
        let text = self.client.complete(&prompt, &self.options).await?;

        let citations = included
            .iter()
            .map(|chunk| Citation {
                source: chunk.source.clone(),
                offset: chunk.offset,
            })
            .collect();

        Ok(Answer {
            text: text.trim().to_string(),
            citations,
            degraded: false,
        })
    }

    /// Degraded path: best-effort answer over whatever context is available,
    /// explicitly flagged as low-confidence.
    pub async fn generate_degraded(&self, query: &str, chunks: &[Chunk]) -> Result<Answer> {
        let mut answer = self.generate(query, chunks).await?;
        if !answer.text.starts_with(NO_CONTEXT_MARKER) {
            answer.text = format!("{}\n{}", LOW_CONFIDENCE_DISCLAIMER, answer.text);
        }
        answer.degraded = true;
        Ok(answer)
    }

    /// Numbered source blocks under a token budget (~4 chars per token).
    /// Returns the block text and the chunks that made the cut, in order.
    fn assemble_context<'a>(&self, chunks: &'a [Chunk]) -> (String, Vec<&'a Chunk>) {
        let mut parts = Vec::new();
        let mut included = Vec::new();
        let mut total_tokens = 0;

        for chunk in chunks {
            let chunk_tokens = chunk.text.len() / 4;
            if total_tokens + chunk_tokens > self.config.max_context_tokens && !included.is_empty()
            {
                break;
            }

            let index = included.len() + 1;
            let block = if self.config.include_provenance {
                format!(
                    "[{}] (source: {}, offset: {})\n{}",
                    index, chunk.source, chunk.offset, chunk.text
                )
            } else {
                format!("[{}]\n{}", index, chunk.text)
            };
            parts.push(block);
            included.push(chunk);
            total_tokens += chunk_tokens;
        }

        (parts.join("\n\n") + "\n", included)
    }
}
