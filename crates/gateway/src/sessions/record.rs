//! Session records and the status state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use cr_engine::{EngineConnection, Jid};

/// Where a session sits in its lifecycle.
///
/// Transitions only happen through engine-reported events or an explicit
/// disconnect; the table in [`SessionStatus::can_transition`] is the
/// single source of truth, and anything outside it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Record registered, engine connection being established.
    Initializing,
    /// Pairing code issued, waiting for the out-of-band confirmation.
    AwaitingPairing,
    /// Device authenticated; transport may still be settling.
    Authenticated,
    /// Authenticated with a live transport.
    Connected,
    /// Transport gone. Terminal: reconnecting means a new pairing.
    Disconnected,
}

impl SessionStatus {
    pub fn can_transition(self, to: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, to),
            (Initializing, AwaitingPairing)
                | (Initializing, Authenticated)
                | (Initializing, Disconnected)
                | (AwaitingPairing, Authenticated)
                | (AwaitingPairing, Disconnected)
                | (Authenticated, Connected)
                | (Authenticated, Disconnected)
                // Late Authenticated events arrive after Connected on
                // restored sessions.
                | (Connected, Authenticated)
                | (Connected, Disconnected)
        )
    }

    /// Whether protocol operations (send) are allowed.
    pub fn is_authenticated(self) -> bool {
        matches!(self, SessionStatus::Authenticated | SessionStatus::Connected)
    }
}

/// The `{company_id, user_id}` pair a session was created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tenant {
    pub company_id: String,
    pub user_id: String,
}

/// One live session: identity, status, and the exclusively-owned engine
/// connection.
#[derive(Clone)]
pub struct SessionRecord {
    pub id: String,
    /// Absent for sessions restored at bootstrap (tenant metadata is not
    /// persisted).
    pub tenant: Option<Tenant>,
    /// Bound protocol address; set by the event router on authentication.
    pub jid: Option<Jid>,
    pub status: SessionStatus,
    pub conn: Arc<dyn EngineConnection>,
    /// Serializes protocol commands on this record's connection.
    pub send_lock: Arc<Mutex<()>>,
    pub created_at: DateTime<Utc>,
}

/// Summary returned by list endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub connection_id: String,
    pub jid: Option<String>,
    pub authenticated: bool,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&SessionRecord> for SessionInfo {
    fn from(record: &SessionRecord) -> Self {
        Self {
            connection_id: record.id.clone(),
            jid: record.jid.as_ref().map(|j| j.to_string()),
            authenticated: record.status.is_authenticated(),
            connected: record.status == SessionStatus::Connected,
            created_at: record.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SessionStatus::*;

    #[test]
    fn pairing_path_is_legal() {
        assert!(Initializing.can_transition(AwaitingPairing));
        assert!(AwaitingPairing.can_transition(Authenticated));
        assert!(Authenticated.can_transition(Connected));
    }

    #[test]
    fn disconnect_is_reachable_from_everywhere_live() {
        for from in [Initializing, AwaitingPairing, Authenticated, Connected] {
            assert!(from.can_transition(Disconnected), "{from:?}");
        }
    }

    #[test]
    fn disconnected_is_terminal() {
        for to in [Initializing, AwaitingPairing, Authenticated, Connected] {
            assert!(!Disconnected.can_transition(to), "{to:?}");
        }
    }

    #[test]
    fn no_silent_reauth() {
        assert!(!Disconnected.can_transition(Connected));
        assert!(!Connected.can_transition(AwaitingPairing));
        assert!(!Authenticated.can_transition(AwaitingPairing));
    }

    #[test]
    fn authenticated_states() {
        assert!(Authenticated.is_authenticated());
        assert!(Connected.is_authenticated());
        assert!(!AwaitingPairing.is_authenticated());
        assert!(!Disconnected.is_authenticated());
        assert!(!Initializing.is_authenticated());
    }
}
