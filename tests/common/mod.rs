//! Deterministic in-process fakes shared by the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use ragpilot::embedding::EmbeddingProvider;
use ragpilot::errors::{RagError, Result};
use ragpilot::grading::RelevanceGrader;
use ragpilot::index::{MemoryIndex, VectorIndex};
use ragpilot::llm::{CompletionOptions, LlmClient};
use ragpilot::rewrite::QueryRewriter;
use ragpilot::types::{Chunk, EmbeddedChunk, Verdict};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Bag-of-words embedder: words hash into a fixed number of buckets, so
/// texts sharing words get high cosine similarity. Records every input.
pub struct BagOfWordsEmbedder {
    pub dimension: usize,
    pub calls: AtomicUsize,
    pub inputs: Mutex<Vec<String>>,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: 32,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().push(text.to_string());

        let mut vector = vec![0.0f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut h: usize = 5381;
            for b in word.to_lowercase().bytes() {
                h = h.wrapping_mul(33).wrapping_add(b as usize);
            }
            vector[h % self.dimension] += 1.0;
        }
        Ok(vector)
    }
}

/// LLM stub returning a fixed completion and recording prompts.
pub struct ScriptedLlm {
    pub reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str, _: &CompletionOptions) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}

/// Grader that never accepts, driving the controller through its full
/// retry budget.
pub struct AlwaysInsufficientGrader {
    pub calls: AtomicUsize,
}

impl AlwaysInsufficientGrader {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RelevanceGrader for AlwaysInsufficientGrader {
    async fn grade(&self, _query: &str, _chunks: &[Chunk]) -> Verdict {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Verdict::insufficient("scripted refusal")
    }
}

/// Rewriter that returns its input unchanged, tripping the controller's
/// no-change safety net.
pub struct IdentityRewriter {
    pub calls: AtomicUsize,
}

impl IdentityRewriter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryRewriter for IdentityRewriter {
    async fn rewrite(&self, _original: &str, last: &str, _rationale: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        last.to_string()
    }
}

/// Rewriter that appends a marker every call, always making progress.
pub struct AppendingRewriter {
    pub calls: AtomicUsize,
}

impl AppendingRewriter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryRewriter for AppendingRewriter {
    async fn rewrite(&self, _original: &str, last: &str, _rationale: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{} expanded", last)
    }
}

/// Rewriter that changes the query once, then repeats itself forever.
pub struct StallingRewriter {
    pub calls: AtomicUsize,
}

impl StallingRewriter {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QueryRewriter for StallingRewriter {
    async fn rewrite(&self, original: &str, last: &str, _rationale: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if last == original {
            format!("{} rephrased", original)
        } else {
            last.to_string()
        }
    }
}

/// Grader that only answers after a delay, for exercising the grading
/// deadline. Replies Sufficient so a missed deadline is observable.
pub struct SlowGrader {
    pub delay_ms: u64,
}

#[async_trait]
impl RelevanceGrader for SlowGrader {
    async fn grade(&self, _query: &str, _chunks: &[Chunk]) -> Verdict {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Verdict::Sufficient
    }
}

/// Index whose queries hang long enough to trip a call deadline.
pub struct SlowIndex {
    pub delay_ms: u64,
    pub query_calls: AtomicUsize,
}

impl SlowIndex {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            query_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorIndex for SlowIndex {
    async fn upsert(&self, _chunk: &EmbeddedChunk) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<(Chunk, f32)>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(1)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(Some(32))
    }
}

/// LLM that completes only after a delay.
pub struct SlowLlm {
    pub delay_ms: u64,
}

#[async_trait]
impl LlmClient for SlowLlm {
    async fn complete(&self, _: &str, _: &CompletionOptions) -> Result<String> {
        tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
        Ok("late reply".to_string())
    }
}

/// Index whose queries always fail, for exercising the retry path.
pub struct FailingIndex {
    pub query_calls: AtomicUsize,
}

impl FailingIndex {
    pub fn new() -> Self {
        Self {
            query_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _chunk: &EmbeddedChunk) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], _k: usize) -> Result<Vec<(Chunk, f32)>> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::RetrievalFailure("index offline".to_string()))
    }

    async fn delete(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(1)
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(Some(32))
    }
}

/// Seed an in-memory index with chunks through the bag-of-words embedder.
pub async fn seed_index(
    embedder: &BagOfWordsEmbedder,
    chunks: &[Chunk],
) -> Arc<MemoryIndex> {
    let index = Arc::new(MemoryIndex::new());
    for chunk in chunks {
        let vector = embedder.embed(&chunk.text).await.unwrap();
        index
            .upsert(&EmbeddedChunk::new(chunk.clone(), vector))
            .await
            .unwrap();
    }
    index
}
