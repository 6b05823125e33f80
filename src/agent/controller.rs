//! Agent controller: the bounded decision loop for one user turn.
//!
//! Owns the conversation state and drives retrieve -> grade -> (rewrite ->
//! retrieve)* -> generate through the state machine in `state.rs`. Every
//! collaborator call runs under a deadline; retrieval and generation
//! failures retry with exponential backoff before surfacing, grading
//! failures degrade, and the rewrite loop is doubly bounded by the retry
//! budget and the no-change safety net.

use crate::agent::memory::ConversationState;
use crate::agent::state::{ControllerState, StateEvent};
use crate::config::AgentConfig;
use crate::errors::{RagError, Result};
use crate::generation::AnswerGenerator;
use crate::grading::RelevanceGrader;
use crate::retrieval::Retriever;
use crate::rewrite::QueryRewriter;
use crate::session::SessionStore;
use crate::types::{Answer, Chunk, RetrievalResult, Turn, Verdict};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument, warn};

/// Orchestrates one conversation. One turn runs to completion before the
/// next is accepted; independent sessions get independent controllers.
pub struct AgentController {
    retriever: Arc<Retriever>,
    grader: Arc<dyn RelevanceGrader>,
    rewriter: Arc<dyn QueryRewriter>,
    generator: AnswerGenerator,
    config: AgentConfig,

    state: ControllerState,
    memory: ConversationState,

    /// Optional append-only persistence for completed turns
    session_store: Option<SessionStore>,

    /// Cooperative cancellation, checked at state boundaries only
    cancel: Arc<AtomicBool>,
}

impl AgentController {
    pub fn new(
        retriever: Arc<Retriever>,
        grader: Arc<dyn RelevanceGrader>,
        rewriter: Arc<dyn QueryRewriter>,
        generator: AnswerGenerator,
        config: AgentConfig,
    ) -> Self {
        let memory = ConversationState::with_capacity(config.max_memory_turns);
        Self {
            retriever,
            grader,
            rewriter,
            generator,
            config,
            state: ControllerState::Start,
            memory,
            session_store: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persist completed turns through `store`.
    pub fn with_session_store(mut self, store: SessionStore) -> Self {
        self.session_store = Some(store);
        self
    }

    /// Resume conversation history from prior turns.
    pub fn with_history(mut self, session_id: &str, turns: Vec<Turn>) -> Self {
        self.memory = ConversationState::resume(session_id, turns, self.config.max_memory_turns);
        self
    }

    /// Shared flag a session owner can set to abort the current turn at its
    /// next state boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn memory(&self) -> &ConversationState {
        &self.memory
    }

    /// Run one user turn to completion.
    ///
    /// Appends exactly one `Turn` to memory on success. On failure the
    /// conversation state is untouched and the error names the state and
    /// working query that were in flight.
    #[instrument(skip(self), fields(session = %self.memory.session_id()))]
    pub async fn run_turn(&mut self, user_query: &str) -> Result<Answer> {
        let user_query = user_query.trim();
        if user_query.is_empty() {
            return Err(RagError::Input("Query must not be empty".to_string()));
        }

        self.state = ControllerState::Start;
        match self.drive_turn(user_query).await {
            Ok(answer) => Ok(answer),
            Err(err) => {
                self.state = ControllerState::Failed;
                Err(err)
            }
        }
    }

    async fn drive_turn(&mut self, user_query: &str) -> Result<Answer> {
        let mut working_query = self.initial_query(user_query);
        let mut retry_count: u32 = 0;
        let mut unchanged_rewrites: u32 = 0;
        let mut degraded = false;

        let mut context: Vec<RetrievalResult> = Vec::new();
        let mut verdicts: Vec<Verdict> = Vec::new();

        self.advance(StateEvent::BeginTurn)?;

        loop {
            self.check_cancelled()?;

            match self.state {
                ControllerState::Retrieving => {
                    context = self
                        .retrieve_with_retry(&working_query)
                        .await
                        .map_err(|e| e.in_state("Retrieving", &working_query))?;
                    debug!(hits = context.len(), query = %working_query, "retrieved");
                    self.advance(StateEvent::Retrieved)?;
                }

                ControllerState::Grading => {
                    let chunks: Vec<Chunk> =
                        context.iter().map(|r| r.chunk.clone()).collect();
                    let verdict = self.grade_with_deadline(&working_query, &chunks).await;
                    debug!(?verdict, "graded");
                    verdicts.push(verdict.clone());

                    if verdict.is_sufficient() {
                        self.advance(StateEvent::Sufficient)?;
                    } else if retry_count < self.config.max_retries {
                        retry_count += 1;
                        self.advance(StateEvent::Insufficient)?;
                    } else {
                        info!(retry_count, "retry budget exhausted; answering degraded");
                        degraded = true;
                        self.advance(StateEvent::Exhausted)?;
                    }
                }

                ControllerState::Rewriting => {
                    let rationale = verdicts
                        .last()
                        .and_then(|v| v.rationale())
                        .unwrap_or("")
                        .to_string();

                    let rewritten = self
                        .rewrite_with_deadline(user_query, &working_query, &rationale)
                        .await;

                    if rewritten == working_query {
                        unchanged_rewrites += 1;
                    } else {
                        unchanged_rewrites = 0;
                    }

                    // Two unchanged rewrites in a row mean the loop cannot
                    // make progress regardless of remaining budget.
                    if unchanged_rewrites >= 2 {
                        warn!(query = %working_query, "rewriter stalled; answering degraded");
                        degraded = true;
                        self.advance(StateEvent::Unproductive)?;
                    } else {
                        debug!(from = %working_query, to = %rewritten, "rewrote query");
                        working_query = rewritten;
                        self.advance(StateEvent::Rewritten)?;
                    }
                }

                ControllerState::Generating => {
                    let chunks: Vec<Chunk> =
                        context.iter().map(|r| r.chunk.clone()).collect();

                    let answer = self
                        .generate_with_retry(&working_query, &chunks, degraded)
                        .await
                        .map_err(|e| e.in_state("Generating", &working_query))?;

                    let mut turn = Turn::new(user_query, answer.text.clone());
                    turn.retrieved_chunks = chunks;
                    turn.grading_verdicts = verdicts.clone();

                    if let Some(store) = &self.session_store {
                        store.append(self.memory.session_id(), &turn)?;
                    }
                    self.memory.push_turn(turn);

                    self.advance(StateEvent::Generated)?;
                    info!(degraded, citations = answer.citations.len(), "turn complete");
                    return Ok(answer);
                }

                state => {
                    return Err(RagError::InvalidTransition {
                        from: format!("{:?}", state),
                        event: "none".to_string(),
                        reason: "Controller loop entered a non-operating state".to_string(),
                    });
                }
            }
        }
    }

    /// Fold recent conversation turns into the first retrieval query.
    fn initial_query(&self, user_query: &str) -> String {
        if self.memory.is_empty() || self.config.memory_turns == 0 {
            return user_query.to_string();
        }

        let mut preamble = String::new();
        for turn in self.memory.recent(self.config.memory_turns) {
            preamble.push_str(&format!(
                "Q: {}\nA: {}\n",
                turn.user_query,
                truncate(&turn.final_answer, 200)
            ));
        }
        format!("{}Current question: {}", preamble, user_query)
    }

    fn advance(&mut self, event: StateEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        debug!(from = self.state.display_name(), to = next.display_name(), "transition");
        self.state = next;
        Ok(())
    }

    fn check_cancelled(&mut self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            let state = self.state.display_name().to_string();
            self.state = ControllerState::Failed;
            return Err(RagError::Cancelled { state });
        }
        Ok(())
    }

    fn call_deadline(&self) -> Duration {
        Duration::from_millis(self.config.call_timeout_ms)
    }

    /// Retrieval under deadline, retried with backoff on collaborator
    /// failure. Empty-index and input errors are not retried.
    async fn retrieve_with_retry(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        let mut attempt = 0;
        loop {
            let outcome = timeout(self.call_deadline(), self.retriever.retrieve(query)).await;
            let err = match outcome {
                Ok(Ok(results)) => return Ok(results),
                Ok(Err(e)) => e,
                Err(_) => RagError::Timeout {
                    duration_ms: self.config.call_timeout_ms,
                },
            };

            if !is_retryable(&err) || attempt >= self.config.collaborator_retries {
                return Err(err);
            }
            warn!(attempt, error = %err, "retrieval failed; backing off");
            self.backoff(attempt).await;
            attempt += 1;
        }
    }

    /// Grading is total from the controller's perspective: a deadline miss
    /// becomes an insufficient verdict, never an error.
    async fn grade_with_deadline(&self, query: &str, chunks: &[Chunk]) -> Verdict {
        match timeout(self.call_deadline(), self.grader.grade(query, chunks)).await {
            Ok(verdict) => verdict,
            Err(_) => {
                warn!("grader deadline exceeded; degrading");
                Verdict::insufficient("grader unavailable")
            }
        }
    }

    /// Rewriting under deadline; a miss returns the query unchanged, which
    /// counts toward the no-change safety net.
    async fn rewrite_with_deadline(
        &self,
        original: &str,
        last: &str,
        rationale: &str,
    ) -> String {
        match timeout(
            self.call_deadline(),
            self.rewriter.rewrite(original, last, rationale),
        )
        .await
        {
            Ok(rewritten) => rewritten,
            Err(_) => {
                warn!("rewriter deadline exceeded; keeping query");
                last.to_string()
            }
        }
    }

    async fn generate_with_retry(
        &self,
        query: &str,
        chunks: &[Chunk],
        degraded: bool,
    ) -> Result<Answer> {
        let mut attempt = 0;
        loop {
            let fut = async {
                if degraded {
                    self.generator.generate_degraded(query, chunks).await
                } else {
                    self.generator.generate(query, chunks).await
                }
            };

            let err = match timeout(self.call_deadline(), fut).await {
                Ok(Ok(answer)) => return Ok(answer),
                Ok(Err(e)) => e,
                Err(_) => RagError::Timeout {
                    duration_ms: self.config.call_timeout_ms,
                },
            };

            if !is_retryable(&err) || attempt >= self.config.collaborator_retries {
                return Err(err);
            }
            warn!(attempt, error = %err, "generation failed; backing off");
            self.backoff(attempt).await;
            attempt += 1;
        }
    }

    /// Exponential backoff with jitter: base * 2^attempt + rand(0..base/2).
    async fn backoff(&self, attempt: u32) {
        let base = self.config.backoff_base_ms;
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        let delay = base.saturating_mul(1 << attempt.min(8)) + jitter;
        sleep(Duration::from_millis(delay)).await;
    }
}

/// Collaborator failures worth another attempt. Configuration, input, and
/// empty-index errors never improve on retry.
fn is_retryable(err: &RagError) -> bool {
    matches!(
        err,
        RagError::Embedding(_)
            | RagError::Generation(_)
            | RagError::RetrievalFailure(_)
            | RagError::Timeout { .. }
            | RagError::Http(_)
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}
