//! In-process engine driver.
//!
//! Stands in for a real protocol binding during development and in
//! tests: unregistered identities get a pairing code (optionally
//! auto-confirmed), registered ones reconnect as already authenticated,
//! and every sent text is echoed back as an inbound message.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use cr_domain::error::{Error, Result};

use crate::driver::{EngineConnection, EngineDriver, EngineSession, SendReceipt};
use crate::event::{EngineEvent, PairingUpdate};
use crate::identity::DeviceIdentity;
use crate::jid::{Jid, DEFAULT_SERVER};

const PAIRING_CHANNEL_CAPACITY: usize = 8;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const AUTO_PAIR_DELAY: Duration = Duration::from_millis(20);

pub struct LoopbackDriver {
    auto_pair: bool,
}

impl Default for LoopbackDriver {
    fn default() -> Self {
        Self::new(false)
    }
}

impl LoopbackDriver {
    pub fn new(auto_pair: bool) -> Self {
        Self { auto_pair }
    }
}

#[async_trait]
impl EngineDriver for LoopbackDriver {
    async fn open(&self, identity: &DeviceIdentity) -> Result<EngineSession> {
        let (pairing_tx, pairing_rx) = mpsc::channel(PAIRING_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let conn = Arc::new(LoopbackConnection {
            channels: Mutex::new(Some(Channels {
                pairing: pairing_tx,
                events: event_tx,
            })),
        });

        let jid = identity
            .jid
            .clone()
            .unwrap_or_else(|| synthesized_jid(&identity.session_id));

        if identity.registered {
            // Stored credentials short-circuit pairing.
            conn.push_pairing(PairingUpdate::Connected);
            conn.push_event(EngineEvent::Authenticated { jid });
            conn.push_event(EngineEvent::Connected);
        } else {
            let code = format!(
                "LOOP-{}",
                &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
            );
            conn.push_pairing(PairingUpdate::Code(code));

            if self.auto_pair {
                let conn = conn.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(AUTO_PAIR_DELAY).await;
                    conn.push_pairing(PairingUpdate::Connected);
                    conn.push_event(EngineEvent::Authenticated { jid });
                    conn.push_event(EngineEvent::Connected);
                });
            }
        }

        Ok(EngineSession {
            conn,
            pairing: pairing_rx,
            events: event_rx,
        })
    }
}

struct Channels {
    pairing: mpsc::Sender<PairingUpdate>,
    events: mpsc::Sender<EngineEvent>,
}

pub struct LoopbackConnection {
    /// `None` once disconnected; dropping the senders closes both streams.
    channels: Mutex<Option<Channels>>,
}

impl LoopbackConnection {
    fn push_event(&self, event: EngineEvent) {
        if let Some(ch) = self.channels.lock().as_ref() {
            let _ = ch.events.try_send(event);
        }
    }

    fn push_pairing(&self, update: PairingUpdate) {
        if let Some(ch) = self.channels.lock().as_ref() {
            let _ = ch.pairing.try_send(update);
        }
    }
}

#[async_trait]
impl EngineConnection for LoopbackConnection {
    async fn send_text(&self, to: &Jid, text: &str) -> Result<SendReceipt> {
        let events = self
            .channels
            .lock()
            .as_ref()
            .map(|ch| ch.events.clone())
            .ok_or_else(|| Error::EngineUnavailable("connection closed".into()))?;

        let receipt = SendReceipt {
            message_id: Uuid::new_v4().simple().to_string().to_uppercase(),
            timestamp: Utc::now(),
        };

        // Echo the text back as an inbound message from the recipient.
        let _ = events.try_send(EngineEvent::Message {
            from: to.clone(),
            text: text.to_owned(),
        });

        Ok(receipt)
    }

    async fn disconnect(&self) {
        let taken = self.channels.lock().take();
        if let Some(ch) = taken {
            let _ = ch.events.try_send(EngineEvent::Disconnected);
            // Senders drop here; both streams close.
        }
    }
}

/// Deterministic phone-style address derived from the session id.
fn synthesized_jid(session_id: &str) -> Jid {
    let mut hasher = DefaultHasher::new();
    session_id.hash(&mut hasher);
    Jid::new(format!("{:010}", hasher.finish() % 10_000_000_000), DEFAULT_SERVER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unregistered_identity_gets_a_code() {
        let driver = LoopbackDriver::default();
        let identity = DeviceIdentity::new("conn_1");
        let mut session = driver.open(&identity).await.unwrap();

        match session.pairing.recv().await.unwrap() {
            PairingUpdate::Code(code) => assert!(code.starts_with("LOOP-")),
            other => panic!("expected a code, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn registered_identity_reconnects_without_pairing() {
        let driver = LoopbackDriver::default();
        let mut identity = DeviceIdentity::new("conn_2");
        identity.jid = Some(Jid::parse("5511999999999").unwrap());
        identity.registered = true;

        let mut session = driver.open(&identity).await.unwrap();
        assert_eq!(
            session.pairing.recv().await.unwrap(),
            PairingUpdate::Connected
        );
        match session.events.recv().await.unwrap() {
            EngineEvent::Authenticated { jid } => {
                assert_eq!(jid.user, "5511999999999");
            }
            other => panic!("expected Authenticated, got {other:?}"),
        }
        assert_eq!(session.events.recv().await.unwrap(), EngineEvent::Connected);
    }

    #[tokio::test]
    async fn auto_pair_completes_after_the_code() {
        let driver = LoopbackDriver::new(true);
        let identity = DeviceIdentity::new("conn_3");
        let mut session = driver.open(&identity).await.unwrap();

        assert!(matches!(
            session.pairing.recv().await.unwrap(),
            PairingUpdate::Code(_)
        ));
        assert!(matches!(
            session.events.recv().await.unwrap(),
            EngineEvent::Authenticated { .. }
        ));
    }

    #[tokio::test]
    async fn send_echoes_inbound() {
        let driver = LoopbackDriver::default();
        let mut identity = DeviceIdentity::new("conn_4");
        identity.registered = true;
        let mut session = driver.open(&identity).await.unwrap();

        let to = Jid::parse("5511888887777").unwrap();
        let receipt = session.conn.send_text(&to, "oi").await.unwrap();
        assert!(!receipt.message_id.is_empty());

        // Skip the Authenticated/Connected replay, then expect the echo.
        loop {
            match session.events.recv().await.unwrap() {
                EngineEvent::Message { from, text } => {
                    assert_eq!(from, to);
                    assert_eq!(text, "oi");
                    break;
                }
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn disconnect_closes_streams_and_fails_sends() {
        let driver = LoopbackDriver::default();
        let identity = DeviceIdentity::new("conn_5");
        let mut session = driver.open(&identity).await.unwrap();

        session.conn.disconnect().await;

        // Drain: Disconnected then closed.
        let mut saw_disconnect = false;
        while let Some(event) = session.events.recv().await {
            if event == EngineEvent::Disconnected {
                saw_disconnect = true;
            }
        }
        assert!(saw_disconnect);

        let to = Jid::parse("5511888887777").unwrap();
        assert!(session.conn.send_text(&to, "late").await.is_err());
    }

    #[tokio::test]
    async fn disconnect_unblocks_pairing_waiter() {
        let driver = LoopbackDriver::default();
        let identity = DeviceIdentity::new("conn_6");
        let mut session = driver.open(&identity).await.unwrap();

        // Consume the code, then disconnect; the stream must close.
        let _ = session.pairing.recv().await.unwrap();
        session.conn.disconnect().await;
        assert!(session.pairing.recv().await.is_none());
    }

    #[test]
    fn synthesized_jid_is_stable() {
        assert_eq!(synthesized_jid("abc"), synthesized_jid("abc"));
        assert_ne!(synthesized_jid("abc"), synthesized_jid("abd"));
    }
}
