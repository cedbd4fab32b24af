//! The event router: one dispatch point from engine events to session
//! state.
//!
//! Each attached session gets its own detached task that consumes the
//! engine's event stream in order, so per-session ordering is preserved
//! while sessions stay independent of each other. The task owns its
//! session id by value; once the stream closes it simply ends. Events
//! for a session that has already been removed are dropped silently —
//! a disconnect racing a late event is normal, not an error.

use std::sync::Arc;

use tokio::sync::mpsc;

use cr_engine::{EngineEvent, IdentityStore, Jid};

use crate::relay::WebhookRelay;
use crate::sessions::record::SessionStatus;
use crate::sessions::registry::{Applied, SessionRegistry};

#[derive(Clone)]
pub struct EventRouter {
    registry: Arc<SessionRegistry>,
    identities: Arc<dyn IdentityStore>,
    relay: Arc<WebhookRelay>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        identities: Arc<dyn IdentityStore>,
        relay: Arc<WebhookRelay>,
    ) -> Self {
        Self {
            registry,
            identities,
            relay,
        }
    }

    /// Spawn the dispatch task for one session's event stream.
    pub fn attach(&self, session_id: String, mut events: mpsc::Receiver<EngineEvent>) {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                router.dispatch(&session_id, event);
            }
            tracing::debug!(session_id = %session_id, "event stream closed");
        });
    }

    fn dispatch(&self, session_id: &str, event: EngineEvent) {
        match event {
            EngineEvent::Connected => {
                self.apply(session_id, SessionStatus::Connected, None);
            }
            EngineEvent::Authenticated { jid } => {
                if self.apply(session_id, SessionStatus::Authenticated, Some(&jid)) {
                    // Persist the binding so bootstrap can restore the
                    // session without re-pairing.
                    if let Err(e) = self.identities.mark_registered(session_id, &jid) {
                        tracing::warn!(
                            session_id,
                            error = %e,
                            "failed to persist authenticated identity"
                        );
                    }
                }
            }
            EngineEvent::Disconnected => {
                self.apply(session_id, SessionStatus::Disconnected, None);
            }
            EngineEvent::Message { from, text } => {
                // Relay only for sessions still in the registry. The
                // relay does its own queueing; the engine's delivery
                // task is never blocked on the webhook sink.
                if self.registry.get(session_id).is_some() {
                    self.relay.enqueue(session_id, from, text);
                } else {
                    tracing::debug!(session_id, "inbound message for removed session dropped");
                }
            }
        }
    }

    /// Apply one transition; returns true if the record changed.
    fn apply(&self, session_id: &str, to: SessionStatus, jid: Option<&Jid>) -> bool {
        match self.registry.transition(session_id, to, jid) {
            Applied::Changed => true,
            Applied::Unchanged => {
                // Replayed lifecycle event; routine on restored sessions.
                tracing::debug!(session_id, ?to, "already in target status");
                false
            }
            Applied::Rejected(from) => {
                tracing::warn!(
                    session_id,
                    ?from,
                    ?to,
                    "illegal status transition rejected"
                );
                false
            }
            Applied::Missing => {
                tracing::debug!(session_id, ?to, "event for removed session dropped");
                false
            }
        }
    }
}
