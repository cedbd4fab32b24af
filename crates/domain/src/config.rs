use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub pairing: PairingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_4000")]
    pub port: u16,
    #[serde(default)]
    pub cors: CorsConfig,
    /// Maximum concurrently served HTTP requests.
    #[serde(default = "d_256")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 4000,
            cors: CorsConfig::default(),
            max_concurrent_requests: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins, or `host:*` patterns matching any port.
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Webhook sink
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Base URL of the backend that receives inbound-message webhooks.
    #[serde(default = "d_backend_url")]
    pub base_url: String,
    #[serde(default = "d_10000")]
    pub timeout_ms: u64,
    /// Bounded relay queue; overflow is dropped (at-most-once contract).
    #[serde(default = "d_256")]
    pub queue_capacity: usize,
    #[serde(default = "d_4")]
    pub workers: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            base_url: d_backend_url(),
            timeout_ms: 10_000,
            queue_capacity: 256,
            workers: 4,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Directory holding durable device identities.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pairing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairingConfig {
    /// How long `/connect` waits for the first pairing code before the
    /// partially-created session is rolled back.
    #[serde(default = "d_60000")]
    pub wait_timeout_ms: u64,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 60_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine driver
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "d_driver")]
    pub driver: EngineKind,
    /// Loopback only: complete pairing automatically after the code is
    /// issued (useful for local end-to-end testing).
    #[serde(default)]
    pub auto_pair: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Loopback,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            driver: EngineKind::Loopback,
            auto_pair: false,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Config {
    /// Apply deployment env overrides (`PORT`, `BACKEND_URL`). These keep
    /// compatibility with the service's original process manager setup.
    pub fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(port = %port, "ignoring unparseable PORT"),
            }
        }
        if let Ok(url) = std::env::var("BACKEND_URL") {
            self.webhook.base_url = url;
        }
    }

    /// Sanity-check the resolved configuration.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut error = |message: String| {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                message,
            });
        };

        if self.webhook.base_url.is_empty() {
            error("webhook.base_url must not be empty".into());
        } else if !self.webhook.base_url.starts_with("http://")
            && !self.webhook.base_url.starts_with("https://")
        {
            error(format!(
                "webhook.base_url must be an http(s) URL, got {:?}",
                self.webhook.base_url
            ));
        }
        if self.webhook.workers == 0 {
            error("webhook.workers must be at least 1".into());
        }
        if self.webhook.queue_capacity == 0 {
            error("webhook.queue_capacity must be at least 1".into());
        }
        if self.pairing.wait_timeout_ms == 0 {
            error("pairing.wait_timeout_ms must be non-zero".into());
        }
        if self.server.max_concurrent_requests == 0 {
            error("server.max_concurrent_requests must be at least 1".into());
        }
        if self.server.host == "0.0.0.0" {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                message: "server.host 0.0.0.0 exposes the gateway on all interfaces".into(),
            });
        }
        issues
    }
}

// ── serde default helpers ─────────────────────────────────────────────

fn d_driver() -> EngineKind {
    EngineKind::Loopback
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_backend_url() -> String {
    "http://localhost:3000".into()
}
fn d_state_path() -> PathBuf {
    PathBuf::from("./data/identities")
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_4000() -> u16 {
    4000
}
fn d_4() -> usize {
    4
}
fn d_256() -> usize {
    256
}
fn d_10000() -> u64 {
    10_000
}
fn d_60000() -> u64 {
    60_000
}
