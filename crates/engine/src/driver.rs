//! The seam between the gateway and a concrete protocol binding.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use cr_domain::error::Result;

use crate::event::{EngineEvent, PairingUpdate};
use crate::identity::DeviceIdentity;
use crate::jid::Jid;

/// Acknowledgement returned by the engine for a sent message.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

/// A live protocol connection, exclusively owned by one session record.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Send a text message. Fails if the connection is closed.
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt>;

    /// Tear down the connection. Closes the pairing and event streams,
    /// unblocking any waiter on them. Idempotent.
    async fn disconnect(&self);
}

/// Everything a freshly opened connection hands back to the gateway.
///
/// Both receivers close when the connection does; the gateway owns them
/// from here on (the pairing flow consumes `pairing`, the event router
/// consumes `events`).
pub struct EngineSession {
    pub conn: Arc<dyn EngineConnection>,
    pub pairing: mpsc::Receiver<PairingUpdate>,
    pub events: mpsc::Receiver<EngineEvent>,
}

/// Factory for engine connections.
#[async_trait]
pub trait EngineDriver: Send + Sync {
    /// Open a connection for a persisted device identity.
    ///
    /// A registered identity reconnects without pairing: the pairing
    /// stream yields [`PairingUpdate::Connected`] immediately. An
    /// unregistered one yields pairing codes until the out-of-band
    /// confirmation arrives.
    async fn open(&self, identity: &DeviceIdentity) -> Result<EngineSession>;
}
