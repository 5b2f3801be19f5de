//! Conversation flow state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.
//! One run per inbound event; nothing is retained between runs.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::{ContactKind, Event};
pub use state::{FlowContext, FlowState, Outcome};
pub use transition::transition;
