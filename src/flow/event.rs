//! Events that drive a flow run

use crate::error::BotError;
use crate::transport::Media;
use serde::Serialize;

/// Classification of the sender, decided by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    /// Contact record was created by this event
    New,
    Known,
}

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// The inbound message, after the sender was resolved
    Classified {
        kind: ContactKind,
        text: String,
        has_media: bool,
    },

    // Ledger events
    /// `None` when the contact has no balance record
    BalanceRead {
        balance: Option<i64>,
    },
    TokenSpent {
        remaining: i64,
    },
    /// Conditional decrement refused the spend
    SpendRefused,

    // Transport events
    MediaDownloaded {
        media: Media,
    },

    /// Every effect of the previous transition ran
    StepsCompleted,

    /// An effect failed; the run aborts without further sends
    StepFailed {
        error: BotError,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Classified { .. } => "classified",
            Event::BalanceRead { .. } => "balance_read",
            Event::TokenSpent { .. } => "token_spent",
            Event::SpendRefused => "spend_refused",
            Event::MediaDownloaded { .. } => "media_downloaded",
            Event::StepsCompleted => "steps_completed",
            Event::StepFailed { .. } => "step_failed",
        }
    }
}
