//! The pairing flow: from a `/connect` request to a pairing code.
//!
//! Bridges the engine's push-based pairing channel to one synchronous
//! result. The caller is blocked only until the first code (or an
//! immediate already-authenticated signal); completion after the code
//! is scanned arrives through the event router. The wait is bounded,
//! and every failure path rolls the partially-created session back out
//! of the registry.

use std::sync::Arc;
use std::time::Duration;

use cr_domain::error::{Error, Result};
use cr_engine::{EngineConnection, EngineDriver, IdentityStore, PairingUpdate};

use crate::events::EventRouter;
use crate::sessions::record::{SessionRecord, SessionStatus, Tenant};
use crate::sessions::registry::SessionRegistry;

/// Outcome of a successful `begin_pairing`.
pub struct PairingResult {
    pub session: SessionRecord,
    /// `None` when stored credentials short-circuited pairing.
    pub code: Option<String>,
}

impl std::fmt::Debug for PairingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingResult")
            .field("session_id", &self.session.id)
            .field("code", &self.code)
            .finish()
    }
}

pub async fn begin_pairing(
    registry: &Arc<SessionRegistry>,
    identities: &Arc<dyn IdentityStore>,
    driver: &Arc<dyn EngineDriver>,
    router: &EventRouter,
    tenant: Tenant,
    wait_timeout: Duration,
) -> Result<PairingResult> {
    let session_id = SessionRegistry::mint_id();
    let identity = identities.create_or_load(&session_id)?;

    let engine = match driver.open(&identity).await {
        Ok(engine) => engine,
        Err(e) => {
            let _ = identities.remove(&session_id);
            return Err(Error::EngineUnavailable(e.to_string()));
        }
    };
    let conn = engine.conn.clone();
    let mut pairing = engine.pairing;

    // Visible in the registry from here until explicit removal (or the
    // rollback below). Duplicate-connect policy: a tenant reconnecting
    // displaces its prior session in the same registry write, so two
    // racing `/connect` calls can never leave both sessions live.
    let (_, displaced) = registry.create(session_id.clone(), Some(tenant), conn.clone());
    router.attach(session_id.clone(), engine.events);
    if let Some(old) = displaced {
        tracing::info!(
            superseded = %old.id,
            session_id = %session_id,
            "tenant reconnect superseded existing session"
        );
        old.conn.disconnect().await;
        if let Err(e) = identities.remove(&old.id) {
            tracing::warn!(session_id = %old.id, error = %e, "failed to drop superseded identity");
        }
    }

    match tokio::time::timeout(wait_timeout, pairing.recv()).await {
        Ok(Some(PairingUpdate::Code(code))) => {
            // The router may already have advanced the status if pairing
            // completed in the same instant; a rejected move here is fine.
            let _ = registry.transition(&session_id, SessionStatus::AwaitingPairing, None);
            let session = registry
                .get(&session_id)
                .ok_or_else(|| Error::EngineUnavailable("session disconnected during pairing".into()))?;
            Ok(PairingResult {
                session,
                code: Some(code),
            })
        }
        Ok(Some(PairingUpdate::Connected)) => {
            let _ = registry.transition(&session_id, SessionStatus::Authenticated, None);
            let _ = registry.transition(&session_id, SessionStatus::Connected, None);
            let session = registry
                .get(&session_id)
                .ok_or_else(|| Error::EngineUnavailable("session disconnected during pairing".into()))?;
            Ok(PairingResult {
                session,
                code: None,
            })
        }
        Ok(None) => {
            roll_back(registry, identities, &session_id, &conn).await;
            Err(Error::EngineUnavailable(
                "engine closed the pairing channel".into(),
            ))
        }
        Err(_) => {
            roll_back(registry, identities, &session_id, &conn).await;
            Err(Error::Timeout(format!(
                "no pairing code within {}ms",
                wait_timeout.as_millis()
            )))
        }
    }
}

async fn roll_back(
    registry: &SessionRegistry,
    identities: &Arc<dyn IdentityStore>,
    session_id: &str,
    conn: &Arc<dyn EngineConnection>,
) {
    registry.remove(session_id);
    conn.disconnect().await;
    if let Err(e) = identities.remove(session_id) {
        tracing::warn!(session_id, error = %e, "failed to drop unpaired identity");
    }
}
