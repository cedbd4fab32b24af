//! Concurrency-safe registry of live sessions.
//!
//! The registry map is the sole synchronization point of the gateway:
//! shared readers for `get`/`list`, exclusive writers for the rest.
//! Engine I/O never happens under the lock — `remove` hands the record
//! back so the caller can disconnect outside it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use uuid::Uuid;

use cr_engine::{EngineConnection, Jid};

use super::record::{SessionInfo, SessionRecord, SessionStatus, Tenant};

/// Result of applying a status transition to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    /// Already in the target status; nothing to do. Engines replay
    /// lifecycle events on reconnect, so this is routine, not an error.
    Unchanged,
    /// The transition table forbids this move; status left untouched.
    Rejected(SessionStatus),
    /// No record with that id (e.g. concurrently disconnected).
    Missing,
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a process-unique session id in the wire format callers see.
    /// Minting is separate from [`create`](Self::create) because the
    /// identity store and engine need the id before the record exists.
    pub fn mint_id() -> String {
        format!("conn_{}", Uuid::new_v4().simple())
    }

    /// Register a new session in `Initializing` state. When the tenant
    /// already owns a live session, that session is displaced under the
    /// same write lock and handed back so the caller can disconnect it;
    /// the map never holds two sessions for one tenant.
    pub fn create(
        &self,
        id: String,
        tenant: Option<Tenant>,
        conn: Arc<dyn EngineConnection>,
    ) -> (SessionRecord, Option<SessionRecord>) {
        let record = SessionRecord {
            id,
            tenant,
            jid: None,
            status: SessionStatus::Initializing,
            conn,
            send_lock: Arc::new(Mutex::new(())),
            created_at: Utc::now(),
        };
        let mut sessions = self.sessions.write();
        let displaced = record.tenant.as_ref().and_then(|tenant| {
            let old_id = sessions
                .values()
                .find(|r| r.tenant.as_ref() == Some(tenant))
                .map(|r| r.id.clone())?;
            sessions.remove(&old_id)
        });
        tracing::info!(session_id = %record.id, "session created");
        sessions.insert(record.id.clone(), record.clone());
        (record, displaced)
    }

    /// Re-register a previously authenticated session under its stored id
    /// (bootstrap path). Status starts at `Authenticated`.
    pub fn restore(
        &self,
        session_id: &str,
        jid: Option<Jid>,
        conn: Arc<dyn EngineConnection>,
    ) -> SessionRecord {
        let record = SessionRecord {
            id: session_id.to_owned(),
            tenant: None,
            jid,
            status: SessionStatus::Authenticated,
            conn,
            send_lock: Arc::new(Mutex::new(())),
            created_at: Utc::now(),
        };
        let mut sessions = self.sessions.write();
        if sessions
            .insert(session_id.to_owned(), record.clone())
            .is_some()
        {
            tracing::warn!(session_id, "restore replaced an existing session");
        }
        record
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Snapshot of all sessions; order is not meaningful.
    pub fn list(&self) -> Vec<SessionInfo> {
        self.sessions.read().values().map(SessionInfo::from).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Remove a session, returning the record so the caller can close its
    /// engine connection. Unknown ids are a no-op (`None`).
    pub fn remove(&self, session_id: &str) -> Option<SessionRecord> {
        let removed = self.sessions.write().remove(session_id);
        if removed.is_some() {
            tracing::info!(session_id, "session removed");
        }
        removed
    }

    /// Drain every session (shutdown path).
    pub fn drain(&self) -> Vec<SessionRecord> {
        self.sessions.write().drain().map(|(_, r)| r).collect()
    }

    /// Atomically apply one status transition, optionally binding the
    /// authenticated address. Illegal moves are rejected, not applied;
    /// a same-state transition is a quiet no-op.
    pub fn transition(
        &self,
        session_id: &str,
        to: SessionStatus,
        jid: Option<&Jid>,
    ) -> Applied {
        let mut sessions = self.sessions.write();
        let Some(record) = sessions.get_mut(session_id) else {
            return Applied::Missing;
        };
        if record.status == to {
            if let Some(jid) = jid {
                record.jid = Some(jid.clone());
            }
            return Applied::Unchanged;
        }
        if !record.status.can_transition(to) {
            return Applied::Rejected(record.status);
        }
        record.status = to;
        if let Some(jid) = jid {
            record.jid = Some(jid.clone());
        }
        Applied::Changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cr_domain::error::{Error, Result};
    use cr_engine::driver::SendReceipt;

    /// Connection stub for registry-only tests.
    struct NullConnection;

    #[async_trait]
    impl EngineConnection for NullConnection {
        async fn send_text(&self, _to: &Jid, _text: &str) -> Result<SendReceipt> {
            Err(Error::EngineUnavailable("null connection".into()))
        }

        async fn disconnect(&self) {}
    }

    fn null_conn() -> Arc<dyn EngineConnection> {
        Arc::new(NullConnection)
    }

    fn tenant(company: &str, user: &str) -> Tenant {
        Tenant {
            company_id: company.into(),
            user_id: user.into(),
        }
    }

    #[test]
    fn create_get_list_remove() {
        let reg = SessionRegistry::new();
        let (record, _) =
            reg.create(SessionRegistry::mint_id(), Some(tenant("c1", "u1")), null_conn());

        assert!(reg.get(&record.id).is_some());
        assert_eq!(reg.list().len(), 1);
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(&record.id).is_some());
        assert!(reg.get(&record.id).is_none());
        assert!(reg.is_empty());
        // Idempotent from the registry's perspective.
        assert!(reg.remove(&record.id).is_none());
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let reg = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let reg = reg.clone();
            handles.push(std::thread::spawn(move || {
                (0..50)
                    .map(|_| reg.create(SessionRegistry::mint_id(), None, null_conn()).0.id)
                    .collect::<Vec<_>>()
            }));
        }
        let mut ids: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert_eq!(reg.len(), total);
    }

    #[test]
    fn transition_follows_the_table() {
        let reg = SessionRegistry::new();
        let (record, _) = reg.create(SessionRegistry::mint_id(), None, null_conn());

        assert_eq!(
            reg.transition(&record.id, SessionStatus::AwaitingPairing, None),
            Applied::Changed
        );
        // Pairing must complete before Connected.
        assert_eq!(
            reg.transition(&record.id, SessionStatus::Connected, None),
            Applied::Rejected(SessionStatus::AwaitingPairing)
        );

        let jid = Jid::parse("5511999999999").unwrap();
        assert_eq!(
            reg.transition(&record.id, SessionStatus::Authenticated, Some(&jid)),
            Applied::Changed
        );
        let record = reg.get(&record.id).unwrap();
        assert_eq!(record.status, SessionStatus::Authenticated);
        assert_eq!(record.jid.unwrap().user, "5511999999999");
    }

    #[test]
    fn transition_on_missing_session_reports_missing() {
        let reg = SessionRegistry::new();
        assert_eq!(
            reg.transition("conn_gone", SessionStatus::Connected, None),
            Applied::Missing
        );
    }

    #[test]
    fn rejected_transition_leaves_status_untouched() {
        let reg = SessionRegistry::new();
        let (record, _) = reg.create(SessionRegistry::mint_id(), None, null_conn());
        reg.transition(&record.id, SessionStatus::Disconnected, None);

        assert_eq!(
            reg.transition(&record.id, SessionStatus::Connected, None),
            Applied::Rejected(SessionStatus::Disconnected)
        );
        assert_eq!(
            reg.get(&record.id).unwrap().status,
            SessionStatus::Disconnected
        );
    }

    #[test]
    fn tenant_create_displaces_prior_session() {
        let reg = SessionRegistry::new();
        let t = tenant("acme", "alice");
        let (first, displaced) =
            reg.create(SessionRegistry::mint_id(), Some(t.clone()), null_conn());
        assert!(displaced.is_none());
        let (_other, displaced) =
            reg.create(SessionRegistry::mint_id(), Some(tenant("acme", "bob")), null_conn());
        assert!(displaced.is_none());

        let (second, displaced) = reg.create(SessionRegistry::mint_id(), Some(t), null_conn());
        assert_eq!(displaced.unwrap().id, first.id);
        assert!(reg.get(&first.id).is_none());
        assert!(reg.get(&second.id).is_some());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn concurrent_same_tenant_creates_leave_one_session() {
        let reg = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let reg = reg.clone();
            handles.push(std::thread::spawn(move || {
                let (_, displaced) = reg.create(
                    SessionRegistry::mint_id(),
                    Some(tenant("acme", "alice")),
                    null_conn(),
                );
                usize::from(displaced.is_some())
            }));
        }
        let displaced: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // Every insert except the first displaced exactly one session.
        assert_eq!(reg.len(), 1);
        assert_eq!(displaced, 7);
    }

    #[test]
    fn same_state_transition_is_a_quiet_noop() {
        let reg = SessionRegistry::new();
        let jid = Jid::parse("5511999999999").unwrap();
        reg.restore("conn_stored", Some(jid.clone()), null_conn());

        // Engines replay Authenticated on reconnect; not an illegal move.
        assert_eq!(
            reg.transition("conn_stored", SessionStatus::Authenticated, Some(&jid)),
            Applied::Unchanged
        );
        assert_eq!(
            reg.get("conn_stored").unwrap().status,
            SessionStatus::Authenticated
        );
    }

    #[test]
    fn restore_starts_authenticated_under_stored_id() {
        let reg = SessionRegistry::new();
        let jid = Jid::parse("5511999999999").unwrap();
        reg.restore("conn_stored", Some(jid), null_conn());

        let record = reg.get("conn_stored").unwrap();
        assert_eq!(record.status, SessionStatus::Authenticated);
        let info = &reg.list()[0];
        assert!(info.authenticated);
        assert!(!info.connected);
    }
}
