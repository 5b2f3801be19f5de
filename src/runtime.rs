//! Runtime for dispatching inbound events
//!
//! Each contact gets its own lane: a task that runs that contact's events
//! one at a time, in arrival order. Lanes for different contacts run
//! concurrently. A lane that sits idle is retired and started again on the
//! contact's next event.

mod executor;
pub mod traits;


pub use executor::FlowRunner;
pub use traits::*;

use crate::config::Script;
use crate::contacts::ContactRegistry;
use crate::db::{Contact, ProfileUpdate};
use crate::error::{BotError, BotResult};
use crate::flow::{ContactKind, Event, FlowContext, FlowState, Outcome};
use crate::ledger::TokenLedger;
use crate::message_log::MessageLog;
use crate::transport::{address_for, ChatTransport, InboundEvent, Media, Profile};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the production dispatcher
pub type ProductionDispatcher = Dispatcher<DatabaseStorage, crate::transport::BridgeTransport>;

const LANE_CAPACITY: usize = 64;

/// How long a lane waits for its next event before retiring
pub const DEFAULT_LANE_IDLE: Duration = Duration::from_secs(300);

/// Summary of one processed inbound event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowReport {
    pub contact_id: String,
    /// `None` when the sender could not be resolved
    pub kind: Option<ContactKind>,
    pub final_state: FlowState,
}

impl FlowReport {
    pub fn outcome(&self) -> Option<&Outcome> {
        self.final_state.outcome()
    }
}

/// Result of handing an event to the dispatcher
#[derive(Debug)]
pub enum Dispatched {
    /// Group chat traffic, dropped without a trace
    Ignored,
    /// Sender address carries no identity
    Invalid,
    /// Queued on the sender's lane; resolves once the flow finishes
    Queued(oneshot::Receiver<FlowReport>),
    /// Dispatcher is shutting down
    Closed,
}

struct LaneJob {
    event: InboundEvent,
    reply: oneshot::Sender<FlowReport>,
}

/// Map entry for a running lane. `id` tells a retiring lane whether the
/// entry is still its own.
struct Lane {
    id: u64,
    tx: mpsc::Sender<LaneJob>,
}

type Lanes = Arc<RwLock<HashMap<String, Lane>>>;

/// Components shared by every lane
struct Shared<S, T> {
    storage: S,
    registry: ContactRegistry<S>,
    message_log: MessageLog<S>,
    transport: Arc<T>,
    script: Script,
    call_timeout: Duration,
}

/// Routes inbound events to per-contact lanes
pub struct Dispatcher<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    shared: Arc<Shared<S, T>>,
    lanes: Lanes,
    next_lane: AtomicU64,
    lane_idle: Duration,
    shutdown: CancellationToken,
}

impl<S, T> Dispatcher<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    pub fn new(storage: S, transport: Arc<T>, script: Script, call_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: ContactRegistry::new(storage.clone()),
                message_log: MessageLog::new(storage.clone()),
                storage,
                transport,
                script,
                call_timeout,
            }),
            lanes: Arc::default(),
            next_lane: AtomicU64::new(0),
            lane_idle: DEFAULT_LANE_IDLE,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_lane_idle(mut self, idle: Duration) -> Self {
        self.lane_idle = idle;
        self
    }

    /// Accept an inbound event.
    ///
    /// Group chat events are dropped here, as are events whose sender
    /// address has no identity. Everything else is queued on the sender's
    /// lane.
    pub async fn dispatch(&self, event: InboundEvent) -> Dispatched {
        if event.is_group() {
            return Dispatched::Ignored;
        }
        if event.sender_identity().trim().is_empty() {
            tracing::warn!(from = %event.from, "Event without sender identity");
            return Dispatched::Invalid;
        }
        if self.shutdown.is_cancelled() {
            return Dispatched::Closed;
        }

        let identity = event.sender_identity().to_string();
        let (reply, receiver) = oneshot::channel();
        let mut job = LaneJob { event, reply };

        // A lane that retired between lookup and send is replaced once
        for _ in 0..2 {
            let lane = self.lane(&identity).await;
            match lane.send(job).await {
                Ok(()) => return Dispatched::Queued(receiver),
                Err(mpsc::error::SendError(returned)) => {
                    tracing::debug!(contact = %identity, "Lane closed, recreating");
                    job = returned;
                }
            }
        }

        tracing::error!(contact = %identity, "No lane available");
        Dispatched::Closed
    }

    /// Get or start the lane for `identity`
    async fn lane(&self, identity: &str) -> mpsc::Sender<LaneJob> {
        {
            let lanes = self.lanes.read().await;
            if let Some(lane) = lanes.get(identity) {
                if !lane.tx.is_closed() {
                    return lane.tx.clone();
                }
            }
        }

        let mut lanes = self.lanes.write().await;
        if let Some(lane) = lanes.get(identity) {
            if !lane.tx.is_closed() {
                return lane.tx.clone();
            }
        }

        let (tx, mut rx) = mpsc::channel::<LaneJob>(LANE_CAPACITY);
        let id = self.next_lane.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);
        let registry = Arc::clone(&self.lanes);
        let shutdown = self.shutdown.clone();
        let idle = self.lane_idle;
        let contact = identity.to_string();

        tokio::spawn(async move {
            tracing::debug!(contact = %contact, lane = id, "Lane started");
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    job = rx.recv() => {
                        let Some(LaneJob { event, reply }) = job else { break };
                        let report = shared.handle(event).await;
                        let _ = reply.send(report);
                    }
                    () = tokio::time::sleep(idle) => {
                        let mut lanes = registry.write().await;
                        if !rx.is_empty() {
                            continue;
                        }
                        if lanes.get(&contact).is_some_and(|lane| lane.id == id) {
                            lanes.remove(&contact);
                        }
                        drop(lanes);

                        // Jobs sent on a sender cloned before the removal
                        rx.close();
                        while let Ok(LaneJob { event, reply }) = rx.try_recv() {
                            let report = shared.handle(event).await;
                            let _ = reply.send(report);
                        }
                        break;
                    }
                }
            }
            tracing::debug!(contact = %contact, lane = id, "Lane stopped");
        });

        lanes.insert(
            identity.to_string(),
            Lane {
                id,
                tx: tx.clone(),
            },
        );
        tx
    }

    /// Number of lanes currently registered
    #[cfg(test)]
    pub async fn lane_count(&self) -> usize {
        self.lanes.read().await.len()
    }

    /// Stop every lane. Queued events that have not started are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn registry(&self) -> &ContactRegistry<S> {
        &self.shared.registry
    }

    pub fn ledger(&self) -> &TokenLedger<S> {
        self.shared.registry.ledger()
    }

    pub fn storage(&self) -> &S {
        &self.shared.storage
    }

    /// Send an operator message to a contact, optionally with captioned media
    pub async fn send_direct(
        &self,
        identity: &str,
        text: &str,
        media: Option<&Media>,
    ) -> BotResult<()> {
        let chat = address_for(identity);
        let transport = &self.shared.transport;
        match media {
            Some(media) => {
                bounded(
                    self.shared.call_timeout,
                    transport.send_media(&chat, media, Some(text)),
                )
                .await
            }
            None => bounded(self.shared.call_timeout, transport.send_text(&chat, text)).await,
        }
    }
}

impl<S, T> Shared<S, T>
where
    S: Storage + Clone + 'static,
    T: ChatTransport + 'static,
{
    /// Process one event end to end. Never fails; problems end up in the
    /// report and the log.
    async fn handle(&self, event: InboundEvent) -> FlowReport {
        let identity = event.sender_identity().to_string();

        let (contact, kind) = match self.classify(&identity).await {
            Ok(classified) => classified,
            Err(error) => {
                tracing::error!(contact = %identity, error = %error, "Could not resolve sender");
                return FlowReport {
                    contact_id: identity,
                    kind: None,
                    final_state: FlowState::Done {
                        outcome: Outcome::Aborted {
                            error_kind: error.kind,
                            message: error.message,
                        },
                    },
                };
            }
        };

        let display_name = if contact.display_name.is_empty() {
            identity.clone()
        } else {
            contact.display_name.clone()
        };
        let context = FlowContext::new(
            &identity,
            display_name,
            &event.message_id,
            self.script.clone(),
        );
        let runner = FlowRunner::new(
            context,
            self.registry.ledger().clone(),
            self.message_log.clone(),
            Arc::clone(&self.transport),
            self.call_timeout,
        );

        let final_state = runner
            .run(Event::Classified {
                kind,
                text: event.body,
                has_media: event.has_media,
            })
            .await;

        let report = FlowReport {
            contact_id: identity,
            kind: Some(kind),
            final_state,
        };

        match report.outcome() {
            Some(Outcome::Aborted { error_kind, message }) => {
                tracing::warn!(contact = %report.contact_id, kind = %error_kind, error = %message, "Flow aborted");
            }
            Some(outcome) => {
                tracing::info!(contact = %report.contact_id, outcome = ?outcome, "Flow finished");
            }
            None => {
                tracing::error!(
                    contact = %report.contact_id,
                    state = report.final_state.name(),
                    "Flow stopped early"
                );
            }
        }

        report
    }

    /// Resolve the sender, creating the record on first contact
    async fn classify(&self, identity: &str) -> BotResult<(Contact, ContactKind)> {
        let profile = self.fetch_profile(identity).await;

        if let Some(contact) = self.registry.resolve(identity).await? {
            let contact = self.refresh_profile(contact, &profile).await;
            return Ok((contact, ContactKind::Known));
        }

        let resolved = self.registry.create_if_absent(identity, &profile).await?;
        let kind = if resolved.created {
            ContactKind::New
        } else {
            ContactKind::Known
        };
        Ok((resolved.contact, kind))
    }

    /// Profile lookup is best effort; a failure yields an empty profile
    async fn fetch_profile(&self, identity: &str) -> Profile {
        let chat = address_for(identity);
        match bounded(self.call_timeout, self.transport.contact_profile(&chat)).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(contact = %identity, error = %e, "Profile fetch failed");
                Profile::default()
            }
        }
    }

    /// Persist a changed display name or picture for a known contact
    async fn refresh_profile(&self, contact: Contact, profile: &Profile) -> Contact {
        let update = ProfileUpdate {
            display_name: profile.display_name.clone(),
            picture_ref: profile.profile_picture_url.clone(),
        };
        if !contact.differs_from(&update) {
            return contact;
        }

        match self.registry.update(&contact.identity, &update).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(contact = %contact.identity, error = %e, "Profile refresh failed");
                contact
            }
        }
    }
}

/// Bound a transport call by `limit`; expiry is a transport failure
async fn bounded<R>(limit: Duration, fut: impl Future<Output = BotResult<R>>) -> BotResult<R> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(BotError::transport(format!(
            "Transport call timed out after {limit:?}"
        ))),
    }
}
