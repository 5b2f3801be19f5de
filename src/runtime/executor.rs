//! Flow executor
//!
//! Drives one inbound event through the flow state machine, running each
//! effect against the ledger, the message log and the chat transport.

use super::bounded;
use super::traits::{MessageStore, TokenStore};
use crate::error::{BotResult, ErrorKind};
use crate::flow::{transition, Effect, Event, FlowContext, FlowState};
use crate::ledger::TokenLedger;
use crate::message_log::MessageLog;
use crate::transport::ChatTransport;
use std::sync::Arc;
use std::time::Duration;

/// Runs a single flow to completion
pub struct FlowRunner<S, T>
where
    S: TokenStore + MessageStore + Clone + 'static,
    T: ChatTransport + 'static,
{
    context: FlowContext,
    state: FlowState,
    ledger: TokenLedger<S>,
    message_log: MessageLog<S>,
    transport: Arc<T>,
    /// Upper bound on every transport call
    call_timeout: Duration,
}

impl<S, T> FlowRunner<S, T>
where
    S: TokenStore + MessageStore + Clone + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(
        context: FlowContext,
        ledger: TokenLedger<S>,
        message_log: MessageLog<S>,
        transport: Arc<T>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            context,
            state: FlowState::default(),
            ledger,
            message_log,
            transport,
            call_timeout,
        }
    }

    /// Feed `event` and every event it generates through the machine.
    /// Returns the final state.
    pub async fn run(mut self, event: Event) -> FlowState {
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let event_name = current_event.name();
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!(
                        contact = %self.context.contact_id,
                        state = self.state.name(),
                        error = %e,
                        "Flow transition rejected"
                    );
                    break;
                }
            };

            tracing::debug!(
                contact = %self.context.contact_id,
                event = event_name,
                from = self.state.name(),
                to = result.new_state.name(),
                effects = result.effects.len(),
                "Flow transition"
            );
            self.state = result.new_state;

            // Effects run strictly in order; the first failure skips the rest
            for effect in result.effects {
                let outbound = effect.is_outbound();
                match self.execute_effect(effect).await {
                    Ok(Some(generated)) => events_to_process.push(generated),
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(
                            contact = %self.context.contact_id,
                            state = self.state.name(),
                            outbound,
                            error = %error,
                            "Flow step failed, aborting"
                        );
                        events_to_process.push(Event::StepFailed { error });
                        break;
                    }
                }
            }
        }

        self.state
    }

    async fn execute_effect(&self, effect: Effect) -> BotResult<Option<Event>> {
        let chat = self.context.chat.as_str();

        match effect {
            Effect::ShowTyping => {
                bounded(self.call_timeout, self.transport.send_typing(chat)).await?;
                Ok(None)
            }

            Effect::Pause { delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(None)
            }

            Effect::ClearPresence => {
                bounded(self.call_timeout, self.transport.clear_presence(chat)).await?;
                Ok(None)
            }

            Effect::SendText { text } => {
                bounded(self.call_timeout, self.transport.send_text(chat, &text)).await?;
                Ok(None)
            }

            Effect::SendSticker { media, options } => {
                let send = self.transport.send_sticker(chat, &media, &options);
                bounded(self.call_timeout, send).await?;
                Ok(None)
            }

            Effect::CloseChat => {
                bounded(self.call_timeout, self.transport.close_chat(chat)).await?;
                Ok(None)
            }

            Effect::LogMessage { content, has_media } => {
                self.message_log
                    .append(&self.context.contact_id, &content, has_media)
                    .await;
                Ok(None)
            }

            Effect::ReadBalance => match self.ledger.get(&self.context.contact_id).await {
                Ok(balance) => Ok(Some(Event::BalanceRead {
                    balance: Some(balance),
                })),
                Err(e) if e.kind == ErrorKind::NotFound => {
                    Ok(Some(Event::BalanceRead { balance: None }))
                }
                Err(e) => Err(e),
            },

            Effect::SpendTokens { amount } => {
                match self.ledger.spend(&self.context.contact_id, amount).await {
                    Ok(remaining) => Ok(Some(Event::TokenSpent { remaining })),
                    Err(e) if e.kind == ErrorKind::InsufficientTokens => {
                        tracing::info!(contact = %self.context.contact_id, "Spend refused");
                        Ok(Some(Event::SpendRefused))
                    }
                    Err(e) => Err(e),
                }
            }

            Effect::DownloadMedia => {
                let download = self.transport.download_media(&self.context.message_id);
                let media = bounded(self.call_timeout, download).await?;
                Ok(Some(Event::MediaDownloaded { media }))
            }

            Effect::CompleteSteps => Ok(Some(Event::StepsCompleted)),
        }
    }
}
