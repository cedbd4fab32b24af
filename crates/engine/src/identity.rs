//! Durable per-session device identities.
//!
//! The gateway itself never persists session records; everything that
//! must survive a restart lives here, keyed by session id. The file
//! store keeps one `identities.json` map under the configured state
//! path and rewrites it on every mutation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use cr_domain::error::{Error, Result};

use crate::jid::Jid;

/// Device state for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub session_id: String,
    /// Bound protocol address; set once pairing completes.
    #[serde(default)]
    pub jid: Option<Jid>,
    /// True once the device has authenticated at least once. Registered
    /// identities are restored at bootstrap without re-pairing.
    #[serde(default)]
    pub registered: bool,
    pub created_at: DateTime<Utc>,
}

impl DeviceIdentity {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            jid: None,
            registered: false,
            created_at: Utc::now(),
        }
    }
}

/// Durable storage of device identities.
pub trait IdentityStore: Send + Sync {
    /// All identities that have completed pairing.
    fn load_all(&self) -> Result<Vec<DeviceIdentity>>;

    /// Fetch the identity for a session, creating a blank one if absent.
    fn create_or_load(&self, session_id: &str) -> Result<DeviceIdentity>;

    /// Record successful pairing: bind the address and mark registered.
    fn mark_registered(&self, session_id: &str, jid: &Jid) -> Result<()>;

    /// Forget an identity. Unknown ids are a no-op.
    fn remove(&self, session_id: &str) -> Result<()>;
}

/// JSON-file-backed identity store.
pub struct FileIdentityStore {
    path: PathBuf,
    identities: RwLock<HashMap<String, DeviceIdentity>>,
}

impl FileIdentityStore {
    /// Load or create the store at `state_path/identities.json`.
    pub fn new(state_path: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_path).map_err(Error::Io)?;
        let path = state_path.join("identities.json");

        let identities: HashMap<String, DeviceIdentity> = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        tracing::info!(
            identities = identities.len(),
            path = %path.display(),
            "identity store loaded"
        );

        Ok(Self {
            path,
            identities: RwLock::new(identities),
        })
    }

    fn flush_locked(&self, identities: &HashMap<String, DeviceIdentity>) -> Result<()> {
        let json = serde_json::to_string_pretty(identities).map_err(Error::Json)?;
        std::fs::write(&self.path, json).map_err(Error::Io)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn load_all(&self) -> Result<Vec<DeviceIdentity>> {
        Ok(self
            .identities
            .read()
            .values()
            .filter(|d| d.registered)
            .cloned()
            .collect())
    }

    fn create_or_load(&self, session_id: &str) -> Result<DeviceIdentity> {
        {
            let identities = self.identities.read();
            if let Some(identity) = identities.get(session_id) {
                return Ok(identity.clone());
            }
        }

        let identity = DeviceIdentity::new(session_id);
        let mut identities = self.identities.write();
        let entry = identities
            .entry(session_id.to_owned())
            .or_insert(identity)
            .clone();
        self.flush_locked(&identities)?;
        Ok(entry)
    }

    fn mark_registered(&self, session_id: &str, jid: &Jid) -> Result<()> {
        let mut identities = self.identities.write();
        let identity = identities
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(session_id.to_owned()))?;
        identity.jid = Some(jid.clone());
        identity.registered = true;
        self.flush_locked(&identities)
    }

    fn remove(&self, session_id: &str) -> Result<()> {
        let mut identities = self.identities.write();
        if identities.remove(session_id).is_some() {
            self.flush_locked(&identities)?;
        }
        Ok(())
    }
}
