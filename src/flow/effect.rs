//! Effects produced by state transitions

use crate::transport::{Media, StickerOptions};
use std::time::Duration;

/// Effects to be executed, strictly in order, after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Show the "typing..." presence
    ShowTyping,

    /// Hold for a fixed delay
    Pause { delay: Duration },

    /// Clear presence
    ClearPresence,

    SendText { text: String },

    SendSticker {
        media: Media,
        options: StickerOptions,
    },

    /// Archive/dismiss the chat surface
    CloseChat,

    /// Append the inbound message to the message log (best effort)
    LogMessage { content: String, has_media: bool },

    /// Read the balance; yields `BalanceRead`
    ReadBalance,

    /// Spend tokens; yields `TokenSpent` or `SpendRefused`
    SpendTokens { amount: i64 },

    /// Download the inbound media; yields `MediaDownloaded`
    DownloadMedia,

    /// Yields `StepsCompleted` once everything before it has run
    CompleteSteps,
}

impl Effect {
    /// Typing presence held for `delay`, then cleared
    pub fn typing(delay: Duration) -> [Effect; 3] {
        [
            Effect::ShowTyping,
            Effect::Pause { delay },
            Effect::ClearPresence,
        ]
    }

    pub fn send_text(text: impl Into<String>) -> Self {
        Effect::SendText { text: text.into() }
    }

    /// Whether this effect sends something the contact sees
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            Effect::SendText { .. } | Effect::SendSticker { .. } | Effect::CloseChat
        )
    }
}
