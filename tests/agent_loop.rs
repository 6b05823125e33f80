//! Integration tests for the agent controller's decision loop.

mod common;

use common::*;
use ragpilot::agent::state::ControllerState;
use ragpilot::agent::AgentController;
use ragpilot::config::AgentConfig;
use ragpilot::errors::RagError;
use ragpilot::generation::{AnswerGenerator, LOW_CONFIDENCE_DISCLAIMER, NO_CONTEXT_MARKER};
use ragpilot::grading::{LexicalGrader, RelevanceGrader};
use ragpilot::index::{MemoryIndex, VectorIndex};
use ragpilot::retrieval::{Retriever, SearchParams};
use ragpilot::rewrite::QueryRewriter;
use ragpilot::session::{SessionStore, SessionStoreConfig};
use ragpilot::types::Chunk;
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn test_config() -> AgentConfig {
    AgentConfig {
        max_retries: 2,
        memory_turns: 4,
        max_memory_turns: 100,
        call_timeout_ms: 5_000,
        collaborator_retries: 0,
        backoff_base_ms: 1,
        grader: "lexical".to_string(),
        grader_threshold: 0.3,
    }
}

fn controller_with(
    embedder: Arc<BagOfWordsEmbedder>,
    index: Arc<dyn VectorIndex>,
    grader: Arc<dyn RelevanceGrader>,
    rewriter: Arc<dyn QueryRewriter>,
    llm_reply: &str,
    config: AgentConfig,
) -> AgentController {
    let retriever = Arc::new(Retriever::with_params(
        embedder,
        index,
        SearchParams {
            top_k: 3,
            min_score: -1.0,
            strict_empty_index: false,
        },
    ));
    let generator = AnswerGenerator::new(Arc::new(ScriptedLlm::new(llm_reply)));
    AgentController::new(retriever, grader, rewriter, generator, config)
}

/// Scenario A: a well-stocked index answers a matching question with a
/// sufficient verdict and a citation of the source document.
#[tokio::test]
async fn scenario_a_grounded_answer_cites_source() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![
        Chunk::new("1", "Paris is the capital of France.", "doc1", 0),
        Chunk::new("2", "Bananas ripen faster in paper bags.", "doc2", 0),
    ];
    let index = seed_index(&embedder, &chunks).await;

    let mut controller = controller_with(
        embedder,
        index,
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "Paris is the capital of France. [1]",
        test_config(),
    );

    let answer = controller
        .run_turn("What is the capital of France?")
        .await
        .unwrap();

    assert!(answer.text.contains("Paris"));
    assert!(!answer.degraded);
    assert!(answer.citations.iter().any(|c| c.source == "doc1"));
    assert_eq!(controller.state(), ControllerState::Done);

    let turn = controller.memory().last().unwrap();
    assert!(turn.retrieved_chunks.iter().any(|c| c.id == "1"));
    assert!(turn.grading_verdicts.last().unwrap().is_sufficient());
}

/// Scenario B: an empty index degrades to the no-context disclaimer after
/// the rewrite budget is spent.
#[tokio::test]
async fn scenario_b_empty_index_yields_disclaimer() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let rewriter = Arc::new(AppendingRewriter::new());

    let mut controller = controller_with(
        embedder,
        Arc::new(MemoryIndex::new()),
        Arc::new(LexicalGrader::default()),
        rewriter.clone(),
        "unused",
        test_config(),
    );

    let answer = controller.run_turn("What is the capital of France?").await.unwrap();

    assert!(answer.text.contains(NO_CONTEXT_MARKER));
    assert!(answer.citations.is_empty());
    assert!(answer.degraded);
    // max_retries rewrites before the budget runs out.
    assert_eq!(rewriter.call_count(), 2);

    let turn = controller.memory().last().unwrap();
    assert_eq!(turn.grading_verdicts.len(), 3);
    assert!(turn.grading_verdicts.iter().all(|v| !v.is_sufficient()));
}

/// Scenario C: an always-insufficient grader plus an identity rewriter
/// terminates via the no-change safety net after exactly two retrieval
/// attempts.
#[tokio::test]
async fn scenario_c_no_change_safety_net_terminates_loop() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Unrelated trivia about bananas.", "doc9", 0)];
    let index = seed_index(&embedder, &chunks).await;
    let embeds_after_seeding = embedder.call_count();

    let grader = Arc::new(AlwaysInsufficientGrader::new());
    let rewriter = Arc::new(IdentityRewriter::new());

    let mut controller = controller_with(
        embedder.clone(),
        index,
        grader.clone(),
        rewriter.clone(),
        "best effort answer",
        test_config(),
    );

    let answer = controller.run_turn("anything at all").await.unwrap();

    // Exactly 2 retrieval attempts: the initial one plus one retry before
    // the second unchanged rewrite short-circuits to generation.
    assert_eq!(embedder.call_count() - embeds_after_seeding, 2);
    assert_eq!(rewriter.calls.load(Ordering::SeqCst), 2);
    assert!(answer.degraded);
    assert!(answer.text.starts_with(LOW_CONFIDENCE_DISCLAIMER));
    assert_eq!(controller.state(), ControllerState::Done);
}

/// Loop termination: a rewriter that eventually repeats itself reaches
/// generation within max_retries + 1 retrieval attempts.
#[tokio::test]
async fn stalled_rewriter_bounded_by_retry_budget() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Unrelated trivia.", "doc9", 0)];
    let index = seed_index(&embedder, &chunks).await;
    let embeds_after_seeding = embedder.call_count();

    let config = test_config();
    let max_retries = config.max_retries;

    let mut controller = controller_with(
        embedder.clone(),
        index,
        Arc::new(AlwaysInsufficientGrader::new()),
        Arc::new(StallingRewriter::new()),
        "best effort answer",
        config,
    );

    let answer = controller.run_turn("anything").await.unwrap();
    let attempts = embedder.call_count() - embeds_after_seeding;

    assert!(answer.degraded);
    assert!(attempts as u32 <= max_retries + 1);
}

/// Empty input is rejected before the state machine starts.
#[tokio::test]
async fn empty_query_rejected() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let mut controller = controller_with(
        embedder,
        Arc::new(MemoryIndex::new()),
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "unused",
        test_config(),
    );

    let err = controller.run_turn("   ").await.unwrap_err();
    assert!(matches!(err, RagError::Input(_)));
    assert!(controller.memory().is_empty());
}

/// A pre-set cancellation flag aborts at the first state boundary without
/// touching conversation history.
#[tokio::test]
async fn cancellation_aborts_cleanly() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let mut controller = controller_with(
        embedder,
        Arc::new(MemoryIndex::new()),
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "unused",
        test_config(),
    );

    controller.cancel_flag().store(true, Ordering::SeqCst);
    let err = controller.run_turn("a real question").await.unwrap_err();

    assert!(matches!(err, RagError::Cancelled { .. }));
    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(controller.memory().is_empty());
}

/// Retrieval collaborator failures are retried with backoff, then surfaced
/// with the failing state attached.
#[tokio::test]
async fn retrieval_failure_retried_then_surfaced() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let index = Arc::new(FailingIndex::new());

    let mut config = test_config();
    config.collaborator_retries = 1;

    let mut controller = controller_with(
        embedder,
        index.clone(),
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "unused",
        config,
    );

    let err = controller.run_turn("a question").await.unwrap_err();

    // Initial attempt plus one retry.
    assert_eq!(index.query_calls.load(Ordering::SeqCst), 2);
    match err {
        RagError::TurnFailed { state, working_query, .. } => {
            assert_eq!(state, "Retrieving");
            assert!(working_query.contains("a question"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.state(), ControllerState::Failed);
}

/// A retrieval call that exceeds the deadline counts as a collaborator
/// failure: retried, then surfaced with the timeout as the cause.
#[tokio::test]
async fn retrieval_deadline_miss_retried_then_surfaced() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let index = Arc::new(SlowIndex::new(5_000));

    let mut config = test_config();
    config.call_timeout_ms = 25;
    config.collaborator_retries = 1;

    let mut controller = controller_with(
        embedder,
        index.clone(),
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "unused",
        config,
    );

    let err = controller.run_turn("a question").await.unwrap_err();

    // Initial attempt plus one retry, both cut off by the deadline.
    assert_eq!(index.query_calls.load(Ordering::SeqCst), 2);
    match err {
        RagError::TurnFailed { state, source, .. } => {
            assert_eq!(state, "Retrieving");
            assert!(matches!(*source, RagError::Timeout { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.state(), ControllerState::Failed);
}

/// A grading deadline miss degrades to an insufficient verdict instead of
/// failing the turn.
#[tokio::test]
async fn grading_deadline_miss_degrades() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Paris is the capital of France.", "doc1", 0)];
    let index = seed_index(&embedder, &chunks).await;

    let mut config = test_config();
    config.call_timeout_ms = 25;

    let mut controller = controller_with(
        embedder,
        index,
        Arc::new(SlowGrader { delay_ms: 5_000 }),
        Arc::new(AppendingRewriter::new()),
        "best effort answer",
        config,
    );

    let answer = controller
        .run_turn("What is the capital of France?")
        .await
        .unwrap();

    assert!(answer.degraded);
    let turn = controller.memory().last().unwrap();
    assert_eq!(turn.grading_verdicts.len(), 3);
    assert!(turn
        .grading_verdicts
        .iter()
        .all(|v| v.rationale() == Some("grader unavailable")));
}

/// Generation deadline misses exhaust the collaborator retry budget and then
/// surface with the failing state attached.
#[tokio::test]
async fn generation_deadline_miss_surfaced() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Paris is the capital of France.", "doc1", 0)];
    let index = seed_index(&embedder, &chunks).await;

    let mut config = test_config();
    config.call_timeout_ms = 25;

    let retriever = Arc::new(Retriever::with_params(
        embedder,
        index,
        SearchParams {
            top_k: 3,
            min_score: f32::NEG_INFINITY,
            strict_empty_index: false,
        },
    ));
    let generator = AnswerGenerator::new(Arc::new(SlowLlm { delay_ms: 5_000 }));
    let mut controller = AgentController::new(
        retriever,
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        generator,
        config,
    );

    let err = controller
        .run_turn("What is the capital of France?")
        .await
        .unwrap_err();

    match err {
        RagError::TurnFailed { state, source, .. } => {
            assert_eq!(state, "Generating");
            assert!(matches!(*source, RagError::Timeout { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(controller.state(), ControllerState::Failed);
    assert!(controller.memory().is_empty());
}

/// Recent turns contextualize the next turn's retrieval query.
#[tokio::test]
async fn conversational_memory_feeds_next_turn() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Paris is the capital of France.", "doc1", 0)];
    let index = seed_index(&embedder, &chunks).await;

    let mut controller = controller_with(
        embedder.clone(),
        index,
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "Paris. [1]",
        test_config(),
    );

    controller.run_turn("What is the capital of France?").await.unwrap();
    controller.run_turn("How large is that capital city of France?").await.unwrap();

    assert_eq!(controller.memory().len(), 2);

    let inputs = embedder.inputs.lock().unwrap();
    let second_turn_query = inputs
        .iter()
        .find(|q| q.contains("Current question:"))
        .expect("second turn should carry a conversation preamble");
    assert!(second_turn_query.contains("What is the capital of France?"));
}

/// Completed turns append to the session log; failures do not.
#[tokio::test]
async fn turns_persist_through_session_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(SessionStoreConfig {
        storage_dir: dir.path().to_path_buf(),
    })
    .unwrap();

    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let chunks = vec![Chunk::new("1", "Paris is the capital of France.", "doc1", 0)];
    let index = seed_index(&embedder, &chunks).await;

    let mut controller = controller_with(
        embedder,
        index,
        Arc::new(LexicalGrader::default()),
        Arc::new(AppendingRewriter::new()),
        "Paris. [1]",
        test_config(),
    )
    .with_session_store(store);

    controller.run_turn("What is the capital of France?").await.unwrap();
    let session_id = controller.memory().session_id().to_string();

    let reader = SessionStore::new(SessionStoreConfig {
        storage_dir: dir.path().to_path_buf(),
    })
    .unwrap();
    let turns = reader.load(&session_id).unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].user_query, "What is the capital of France?");
}
