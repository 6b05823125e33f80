//! The agentic control loop: state machine, conversation memory, controller.

pub mod controller;
pub mod memory;
pub mod state;

pub use controller::AgentController;
pub use memory::ConversationState;
pub use state::{ControllerState, StateEvent};
