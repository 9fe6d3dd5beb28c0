//! Session Manager (Component H) — binds client sessions to a pinned
//! shard, tracks at most one open transaction per session, and reaps idle
//! or overlong-lived sessions (§4.H).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, WorkerSqlError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Idle,
    Closing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub tenant_id: String,
    pub shard_id: String,
    pub transaction_id: Option<String>,
    pub last_seen_ms: u64,
    pub state: SessionState,
}

/// Shared session table behind a single lock (§4.H "Concurrency" — sessions
/// map to long-lived channels, not per-query traffic, so lock contention is
/// low by design).
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Session>>,
    idle_ttl_ms: u64,
    max_transaction_ms: u64,
}

impl SessionManager {
    pub fn new(idle_ttl_ms: u64, max_transaction_ms: u64) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), idle_ttl_ms, max_transaction_ms }
    }

    /// Idempotent upsert. Binding a session that already has an open
    /// transaction to a different `shard_id` is rejected — the transaction
    /// pins the shard for its lifetime.
    pub fn bind(
        &self,
        session_id: &str,
        tenant_id: &str,
        shard_id: &str,
        transaction_id: Option<&str>,
        now_ms: u64,
    ) -> Result<Session> {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        if let Some(existing) = sessions.get(session_id) {
            if existing.transaction_id.is_some() && existing.shard_id != shard_id {
                return Err(WorkerSqlError::InvalidInput(format!(
                    "session '{}' has an open transaction pinned to shard '{}'",
                    session_id, existing.shard_id
                )));
            }
        }
        let session = Session {
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
            shard_id: shard_id.to_string(),
            transaction_id: transaction_id.map(|s| s.to_string()),
            last_seen_ms: now_ms,
            state: SessionState::Active,
        };
        sessions.insert(session_id.to_string(), session.clone());
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().expect("session table lock poisoned").get(session_id).cloned()
    }

    pub fn begin_transaction(&self, session_id: &str, tx_id: &str, now_ms: u64) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| WorkerSqlError::NotFound(format!("session '{}' not bound", session_id)))?;
        if session.transaction_id.is_some() {
            return Err(WorkerSqlError::InvalidInput(format!("session '{}' already has an open transaction", session_id)));
        }
        session.transaction_id = Some(tx_id.to_string());
        session.last_seen_ms = now_ms;
        session.state = SessionState::Active;
        Ok(())
    }

    pub fn end_transaction(&self, session_id: &str, now_ms: u64) -> Result<()> {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| WorkerSqlError::NotFound(format!("session '{}' not bound", session_id)))?;
        session.transaction_id = None;
        session.last_seen_ms = now_ms;
        Ok(())
    }

    pub fn release(&self, session_id: &str) {
        self.sessions.write().expect("session table lock poisoned").remove(session_id);
    }

    pub fn touch(&self, session_id: &str, now_ms: u64) {
        if let Some(session) = self.sessions.write().expect("session table lock poisoned").get_mut(session_id) {
            session.last_seen_ms = now_ms;
        }
    }

    /// Reaps idle, non-transactional sessions past `idle_ttl_ms`, and
    /// force-releases in-transaction sessions past `max_transaction_ms`
    /// (their transactions are abandoned — shard-side cleanup is the
    /// shard's responsibility, not a core invariant; see Open Questions).
    /// Returns the ids reaped.
    pub fn cleanup(&self, now_ms: u64) -> Vec<String> {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        let mut reaped = Vec::new();
        sessions.retain(|id, session| {
            let idle_expired = session.transaction_id.is_none() && now_ms.saturating_sub(session.last_seen_ms) >= self.idle_ttl_ms;
            let txn_expired = session.transaction_id.is_some() && now_ms.saturating_sub(session.last_seen_ms) >= self.max_transaction_ms;
            if idle_expired || txn_expired {
                reaped.push(id.clone());
                false
            } else {
                true
            }
        });
        reaped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_get_round_trips() {
        let mgr = SessionManager::new(600_000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        let session = mgr.get("s1").unwrap();
        assert_eq!(session.shard_id, "shard_0");
        assert!(session.transaction_id.is_none());
    }

    #[test]
    fn begin_transaction_rejects_when_already_open() {
        let mgr = SessionManager::new(600_000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        mgr.begin_transaction("s1", "tx1", 0).unwrap();
        let err = mgr.begin_transaction("s1", "tx2", 0).unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidInput");
    }

    #[test]
    fn end_transaction_clears_but_keeps_session() {
        let mgr = SessionManager::new(600_000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        mgr.begin_transaction("s1", "tx1", 0).unwrap();
        mgr.end_transaction("s1", 0).unwrap();
        let session = mgr.get("s1").unwrap();
        assert!(session.transaction_id.is_none());
    }

    #[test]
    fn release_removes_session() {
        let mgr = SessionManager::new(600_000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        mgr.release("s1");
        assert!(mgr.get("s1").is_none());
    }

    #[test]
    fn cleanup_reaps_idle_non_transactional_sessions() {
        let mgr = SessionManager::new(1000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        let reaped = mgr.cleanup(1000);
        assert_eq!(reaped, vec!["s1".to_string()]);
        assert!(mgr.get("s1").is_none());
    }

    #[test]
    fn cleanup_spares_in_transaction_sessions_under_max_lifetime() {
        let mgr = SessionManager::new(1000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        mgr.begin_transaction("s1", "tx1", 0).unwrap();
        let reaped = mgr.cleanup(2000);
        assert!(reaped.is_empty());
        assert!(mgr.get("s1").is_some());
    }

    #[test]
    fn cleanup_force_releases_overlong_transactions() {
        let mgr = SessionManager::new(1000, 300_000);
        mgr.bind("s1", "t1", "shard_0", None, 0).unwrap();
        mgr.begin_transaction("s1", "tx1", 0).unwrap();
        let reaped = mgr.cleanup(300_000);
        assert_eq!(reaped, vec!["s1".to_string()]);
    }

    #[test]
    fn bind_rejects_shard_change_mid_transaction() {
        let mgr = SessionManager::new(600_000, 300_000);
        mgr.bind("s1", "t1", "shard_0", Some("tx1"), 0).unwrap();
        let err = mgr.bind("s1", "t1", "shard_1", Some("tx1"), 0).unwrap_err();
        assert_eq!(err.kind_tag(), "InvalidInput");
    }
}
