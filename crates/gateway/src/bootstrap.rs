//! AppState construction and session restoration.
//!
//! `build_app_state` is the shared boot path; `restore_sessions` brings
//! previously authenticated identities back to life without re-pairing.

use std::sync::Arc;

use anyhow::Context;

use cr_domain::config::{Config, ConfigSeverity, EngineKind};
use cr_engine::loopback::LoopbackDriver;
use cr_engine::{EngineDriver, FileIdentityStore, IdentityStore};

use crate::events::EventRouter;
use crate::relay::WebhookRelay;
use crate::sessions::registry::SessionRegistry;
use crate::state::AppState;

/// Validate config, initialize every subsystem and return a fully-wired
/// [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    let identities: Arc<dyn IdentityStore> = Arc::new(
        FileIdentityStore::new(&config.identity.state_path)
            .context("initializing identity store")?,
    );

    let driver: Arc<dyn EngineDriver> = match config.engine.driver {
        EngineKind::Loopback => Arc::new(LoopbackDriver::new(config.engine.auto_pair)),
    };
    tracing::info!(driver = ?config.engine.driver, "engine driver ready");

    let registry = Arc::new(SessionRegistry::new());

    let relay = WebhookRelay::new(&config.webhook);
    tracing::info!(
        base_url = %config.webhook.base_url,
        workers = config.webhook.workers,
        queue = config.webhook.queue_capacity,
        "webhook relay ready"
    );

    let router = EventRouter::new(registry.clone(), identities.clone(), relay);

    Ok(AppState {
        config,
        registry,
        identities,
        driver,
        router,
    })
}

/// Reconnect every registered identity from the store.
///
/// Runs concurrently with the HTTP server; the registry's per-operation
/// safety covers the race with early `/connect` requests. A failure to
/// reconnect one identity is logged and skipped, never aborting the
/// rest.
pub async fn restore_sessions(state: AppState) {
    let identities = match state.identities.load_all() {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, "failed to load stored identities, starting empty");
            return;
        }
    };
    if identities.is_empty() {
        tracing::info!("no stored identities to restore");
        return;
    }

    let mut restored = 0usize;
    for identity in identities {
        let session_id = identity.session_id.clone();
        match state.driver.open(&identity).await {
            Ok(engine) => {
                state
                    .registry
                    .restore(&session_id, identity.jid.clone(), engine.conn);
                state.router.attach(session_id.clone(), engine.events);
                // The pairing stream of a registered identity only
                // replays the already-connected signal; drop it.
                drop(engine.pairing);
                tracing::info!(
                    session_id = %session_id,
                    jid = ?identity.jid.as_ref().map(|j| j.to_string()),
                    "session restored"
                );
                restored += 1;
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "failed to reconnect stored identity, skipping"
                );
            }
        }
    }
    tracing::info!(restored, "bootstrap finished");
}

/// Disconnect and drop every live session (shutdown path).
pub async fn disconnect_all(state: &AppState) {
    let records = state.registry.drain();
    let count = records.len();
    for record in records {
        record.conn.disconnect().await;
    }
    if count > 0 {
        tracing::info!(count, "all sessions disconnected");
    }
}
