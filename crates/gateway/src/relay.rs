//! Webhook relay for inbound messages.
//!
//! Best-effort, at-most-once: a bounded queue feeds a small worker pool
//! that POSTs each inbound message to the backend webhook. Queue
//! overflow and delivery failures are logged and dropped — nothing here
//! ever reaches an HTTP caller, and no registry lock is held anywhere
//! near the network call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use cr_domain::config::WebhookConfig;
use cr_engine::Jid;

/// One inbound message queued for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct InboundMessage {
    pub connection_id: String,
    pub from: Jid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

pub struct WebhookRelay {
    tx: mpsc::Sender<InboundMessage>,
}

impl WebhookRelay {
    /// Build the relay and spawn its workers.
    pub fn new(config: &WebhookConfig) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        let url = format!(
            "{}/api/whatsapp/webhook",
            config.base_url.trim_end_matches('/')
        );

        for worker in 0..config.workers.max(1) {
            let rx = rx.clone();
            let client = client.clone();
            let url = url.clone();
            tokio::spawn(async move {
                loop {
                    let msg = { rx.lock().await.recv().await };
                    match msg {
                        Some(msg) => deliver(&client, &url, msg).await,
                        None => break,
                    }
                }
                tracing::debug!(worker, "relay worker stopped");
            });
        }

        Arc::new(Self { tx })
    }

    /// Queue a message for delivery. Never blocks; drops with a warning
    /// when the queue is full (the at-most-once contract allows it).
    pub fn enqueue(&self, connection_id: &str, from: Jid, text: String) {
        let msg = InboundMessage {
            connection_id: connection_id.to_owned(),
            from,
            text,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.tx.try_send(msg) {
            tracing::warn!(
                connection_id,
                error = %e,
                "relay queue full, inbound message dropped"
            );
        }
    }
}

async fn deliver(client: &reqwest::Client, url: &str, msg: InboundMessage) {
    let connection_id = msg.connection_id.clone();
    match client.post(url).json(&msg).send().await {
        Ok(resp) if resp.status().is_redirection() || resp.status().is_success() => {
            tracing::debug!(connection_id = %connection_id, status = %resp.status(), "webhook delivered");
        }
        Ok(resp) => {
            tracing::warn!(
                connection_id = %connection_id,
                status = %resp.status(),
                "webhook sink returned non-success status"
            );
        }
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, error = %e, "webhook delivery failed");
        }
    }
}
