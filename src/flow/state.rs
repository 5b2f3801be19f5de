//! Flow state types

use crate::config::Script;
use crate::error::ErrorKind;
use crate::transport::address_for;
use serde::Serialize;

// ============================================================================
// Flow State
// ============================================================================

/// Flow state.
///
/// `Charging`, `Converting` and `Delivering` are the steps of a sticker
/// conversion; `CheckingBalance` precedes the convert/reject decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowState {
    /// Waiting for the classified inbound message
    #[default]
    Classifying,

    /// New contact: running the onboarding script
    Welcoming,

    /// Known contact sent media, balance read in flight
    CheckingBalance,

    /// Balance covers a conversion, spend in flight
    Charging { balance: i64 },

    /// Token spent, media download in flight
    Converting { remaining: i64 },

    /// Sticker and follow-up being sent
    Delivering { remaining: i64 },

    /// Out-of-tokens reply being sent
    Rejecting,

    /// Closing the chat surface
    Closing { outcome: Outcome },

    /// Run finished
    Done { outcome: Outcome },
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Done { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlowState::Classifying => "classifying",
            FlowState::Welcoming => "welcoming",
            FlowState::CheckingBalance => "checking_balance",
            FlowState::Charging { .. } => "charging",
            FlowState::Converting { .. } => "converting",
            FlowState::Delivering { .. } => "delivering",
            FlowState::Rejecting => "rejecting",
            FlowState::Closing { .. } => "closing",
            FlowState::Done { .. } => "done",
        }
    }

    /// Outcome of a finished run
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            FlowState::Done { outcome } => Some(outcome),
            _ => None,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Onboarding script delivered
    Welcomed,
    /// Known contact, no media: logged, no reply
    Logged,
    /// Sticker delivered
    Converted { remaining: i64 },
    /// Out of tokens
    Rejected,
    /// A step failed; remaining steps were skipped
    Aborted { error_kind: ErrorKind, message: String },
}

// ============================================================================
// Flow Context
// ============================================================================

/// Context for a run (immutable)
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub contact_id: String,
    /// Chat address on the transport
    pub chat: String,
    pub display_name: String,
    /// Transport id of the inbound message
    pub message_id: String,
    pub script: Script,
}

impl FlowContext {
    pub fn new(
        contact_id: impl Into<String>,
        display_name: impl Into<String>,
        message_id: impl Into<String>,
        script: Script,
    ) -> Self {
        let contact_id = contact_id.into();
        Self {
            chat: address_for(&contact_id),
            contact_id,
            display_name: display_name.into(),
            message_id: message_id.into(),
            script,
        }
    }
}
