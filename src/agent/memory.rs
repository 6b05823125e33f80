//! Bounded conversational memory for one session.
//!
//! Completed turns accumulate in a fixed-capacity buffer with FIFO eviction.
//! Turns are append-only: the controller pushes a finished `Turn` exactly
//! once per successful turn and never mutates history afterwards.

use crate::types::Turn;
use std::collections::VecDeque;
use uuid::Uuid;

/// Default bound on stored turns
pub const MAX_TURNS: usize = 100;

/// Per-session conversation state, owned exclusively by the controller.
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// Session identifier, stable for the lifetime of the conversation
    session_id: String,

    /// Completed turns, oldest first (bounded by `max_turns`)
    turns: VecDeque<Turn>,

    /// Maximum stored turns
    max_turns: usize,
}

impl ConversationState {
    /// Create a fresh session with default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_TURNS)
    }

    /// Create a session with custom capacity
    pub fn with_capacity(max_turns: usize) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    /// Resume a session with a known id and prior turns
    pub fn resume(session_id: impl Into<String>, turns: Vec<Turn>, max_turns: usize) -> Self {
        let mut state = Self {
            session_id: session_id.into(),
            turns: VecDeque::new(),
            max_turns,
        };
        for turn in turns {
            state.push_turn(turn);
        }
        state
    }

    /// Append a completed turn, evicting the oldest if at capacity
    pub fn push_turn(&mut self, turn: Turn) {
        if self.turns.len() >= self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    /// The most recent `n` turns, oldest of them first
    pub fn recent(&self, n: usize) -> Vec<&Turn> {
        let start = self.turns.len().saturating_sub(n);
        self.turns.range(start..).collect()
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// All stored turns, oldest first
    pub fn turns(&self) -> &VecDeque<Turn> {
        &self.turns
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Drop all history; the session id survives
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}
