//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! state and effects, with no I/O.

use super::{ContactKind, Effect, Event, FlowContext, FlowState, Outcome};
use crate::config::Script;
use crate::ledger::WELCOME_GRANT;
use thiserror::Error;

/// Tokens charged per conversion
pub const CONVERSION_COST: i64 = 1;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: FlowState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: FlowState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Flow already finished")]
    Finished,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &FlowState,
    context: &FlowContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    if state.is_terminal() {
        return Err(TransitionError::Finished);
    }

    let script = &context.script;

    match (state, event) {
        // ============================================================
        // Abort: any failed step ends the run with no further sends
        // ============================================================
        (_, Event::StepFailed { error }) => Ok(TransitionResult::new(FlowState::Done {
            outcome: Outcome::Aborted {
                error_kind: error.kind,
                message: error.message,
            },
        })),

        // ============================================================
        // Classification
        // ============================================================

        // New contact -> Welcoming. Media on the first message is ignored.
        (
            FlowState::Classifying,
            Event::Classified {
                kind: ContactKind::New,
                ..
            },
        ) => Ok(TransitionResult::new(FlowState::Welcoming)
            .with_effects(Effect::typing(script.welcome_delay))
            .with_effect(Effect::send_text(
                Script::intro(&context.display_name, WELCOME_GRANT),
            ))
            .with_effects(Effect::typing(script.welcome_delay))
            .with_effect(Effect::send_text(Script::credited(WELCOME_GRANT)))
            .with_effect(Effect::CompleteSteps)),

        // Known contact, no media -> log only, no reply
        (
            FlowState::Classifying,
            Event::Classified {
                kind: ContactKind::Known,
                text,
                has_media: false,
            },
        ) => Ok(TransitionResult::new(FlowState::Done {
            outcome: Outcome::Logged,
        })
        .with_effect(Effect::LogMessage {
            content: text,
            has_media: false,
        })),

        // Known contact with media -> log, then read the balance
        (
            FlowState::Classifying,
            Event::Classified {
                kind: ContactKind::Known,
                text,
                has_media: true,
            },
        ) => Ok(TransitionResult::new(FlowState::CheckingBalance)
            .with_effect(Effect::LogMessage {
                content: text,
                has_media: true,
            })
            .with_effect(Effect::ReadBalance)),

        // ============================================================
        // Balance decision
        // ============================================================
        (FlowState::CheckingBalance, Event::BalanceRead { balance: Some(balance) })
            if balance >= CONVERSION_COST =>
        {
            Ok(TransitionResult::new(FlowState::Charging { balance }).with_effect(
                Effect::SpendTokens {
                    amount: CONVERSION_COST,
                },
            ))
        }

        // Missing balance counts as zero
        (FlowState::CheckingBalance, Event::BalanceRead { .. })
        | (FlowState::Charging { .. }, Event::SpendRefused) => Ok(reject(context)),

        // ============================================================
        // Conversion
        // ============================================================
        (FlowState::Charging { .. }, Event::TokenSpent { remaining }) => Ok(
            TransitionResult::new(FlowState::Converting { remaining })
                .with_effect(Effect::DownloadMedia),
        ),

        (FlowState::Converting { remaining }, Event::MediaDownloaded { media }) => {
            let remaining = *remaining;
            let follow_up = if remaining <= 0 {
                script.exhausted()
            } else {
                Script::remaining(remaining)
            };

            Ok(TransitionResult::new(FlowState::Delivering { remaining })
                .with_effects(Effect::typing(script.convert_delay))
                .with_effect(Effect::SendSticker {
                    media,
                    options: script.sticker_options(),
                })
                .with_effects(Effect::typing(script.convert_delay))
                .with_effect(Effect::send_text(follow_up))
                .with_effect(Effect::CompleteSteps))
        }

        // ============================================================
        // Closing
        // ============================================================
        (FlowState::Welcoming, Event::StepsCompleted) => Ok(close(Outcome::Welcomed)),

        (FlowState::Delivering { remaining }, Event::StepsCompleted) => Ok(close(
            Outcome::Converted {
                remaining: *remaining,
            },
        )),

        (FlowState::Rejecting, Event::StepsCompleted) => {
            Ok(TransitionResult::new(FlowState::Done {
                outcome: Outcome::Rejected,
            }))
        }

        (FlowState::Closing { outcome }, Event::StepsCompleted) => {
            Ok(TransitionResult::new(FlowState::Done {
                outcome: outcome.clone(),
            }))
        }

        // ============================================================
        // Anything else is a bug in the executor
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} does not accept {}",
            state.name(),
            event.name()
        ))),
    }
}

fn reject(context: &FlowContext) -> TransitionResult {
    TransitionResult::new(FlowState::Rejecting)
        .with_effect(Effect::send_text(context.script.out_of_tokens()))
        .with_effect(Effect::CompleteSteps)
}

fn close(outcome: Outcome) -> TransitionResult {
    TransitionResult::new(FlowState::Closing { outcome })
        .with_effect(Effect::CloseChat)
        .with_effect(Effect::CompleteSteps)
}
