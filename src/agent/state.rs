//! Controller state machine.
//!
//! A deterministic finite state machine over the retrieve-grade-rewrite-
//! generate loop:
//! - Safety: no invalid states reachable
//! - Liveness: every turn ends in Done or Failed
//! - Determinism: unique next state per (state, event) pair

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};

/// Controller execution states for one user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    /// Turn accepted, working query initialized
    Start,

    /// Retrieval in flight against the working query
    Retrieving,

    /// Grading retrieved context for sufficiency
    Grading,

    /// Rewriting the working query for another attempt
    Rewriting,

    /// Producing the final answer from graded context
    Generating,

    /// Answer returned to the caller (terminal)
    Done,

    /// Unrecoverable error or cancellation (terminal)
    Failed,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// User turn begins
    BeginTurn,

    /// Retrieval returned (possibly empty) context
    Retrieved,

    /// Grader judged context sufficient
    Sufficient,

    /// Grader judged context insufficient; retry budget remains
    Insufficient,

    /// Retry budget exhausted; answer with best-effort context
    Exhausted,

    /// Working query replaced; retrieve again
    Rewritten,

    /// Rewriter made no progress twice in a row; answer degraded
    Unproductive,

    /// Final answer produced
    Generated,

    /// Unrecoverable error or cancellation
    Abort,
}

impl ControllerState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ControllerState::Done | ControllerState::Failed)
    }

    /// Attempt state transition with validation.
    ///
    /// Valid transitions:
    /// ```text
    /// 1. Start      -> Retrieving  (on: BeginTurn)
    /// 2. Retrieving -> Grading     (on: Retrieved)
    /// 3. Grading    -> Generating  (on: Sufficient | Exhausted)
    /// 4. Grading    -> Rewriting   (on: Insufficient)
    /// 5. Rewriting  -> Retrieving  (on: Rewritten)
    /// 6. Rewriting  -> Generating  (on: Unproductive)
    /// 7. Generating -> Done        (on: Generated)
    /// 8. Done       -> Done        (terminal)
    /// 9. Failed     -> Failed      (terminal)
    /// 10. *         -> Failed      (on: Abort)
    /// ```
    pub fn transition(&self, event: StateEvent) -> Result<ControllerState> {
        use ControllerState::*;
        use StateEvent::*;

        // Abort reaches Failed from any state.
        if event == Abort {
            return Ok(Failed);
        }

        let next_state = match (self, event) {
            (Start, BeginTurn) => Retrieving,

            (Retrieving, Retrieved) => Grading,

            (Grading, Sufficient) => Generating,
            (Grading, Insufficient) => Rewriting,
            (Grading, Exhausted) => Generating,

            (Rewriting, Rewritten) => Retrieving,
            (Rewriting, Unproductive) => Generating,

            (Generating, Generated) => Done,

            // Terminal states (self-loops)
            (Done, _) => Done,
            (Failed, _) => Failed,

            (from, event) => {
                return Err(RagError::InvalidTransition {
                    from: format!("{:?}", from),
                    event: format!("{:?}", event),
                    reason: format!("No valid transition from {:?} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Get all valid events from this state
    pub fn valid_events(&self) -> Vec<StateEvent> {
        use ControllerState::*;
        use StateEvent::*;

        match self {
            Start => vec![BeginTurn, Abort],
            Retrieving => vec![Retrieved, Abort],
            Grading => vec![Sufficient, Insufficient, Exhausted, Abort],
            Rewriting => vec![Rewritten, Unproductive, Abort],
            Generating => vec![Generated, Abort],
            Done => vec![Abort],
            Failed => vec![Abort],
        }
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            ControllerState::Start => "Starting",
            ControllerState::Retrieving => "Retrieving",
            ControllerState::Grading => "Grading",
            ControllerState::Rewriting => "Rewriting",
            ControllerState::Generating => "Generating",
            ControllerState::Done => "Done",
            ControllerState::Failed => "Failed",
        }
    }
}
