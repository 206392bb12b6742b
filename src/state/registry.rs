//! Process-wide map of users to their live session handle.
//!
//! # Thread Safety
//!
//! Every operation is atomic per key via DashMap. Lookups clone the handle so
//! no shard lock is held across an `.await`.

use chrono::{DateTime, Utc};
use cipher_proto::{CloseReason, ServerFrame};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};

use super::dashmap_ext::DashMapExt;
use super::uid::SessionId;

/// An item queued for a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A frame to serialize and send.
    Frame(Arc<ServerFrame>),
    /// Send a close frame and stop writing.
    Close(CloseReason),
}

/// Cheap, cloneable handle to one live connection.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    tx: mpsc::Sender<Outbound>,
    established_at: DateTime<Utc>,
}

impl SessionHandle {
    pub fn new(id: SessionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            established_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    /// Queue an item, waiting for space.
    pub async fn send(&self, item: Outbound) -> Result<(), SendError<Outbound>> {
        self.tx.send(item).await
    }

    /// Queue an item without waiting.
    pub fn try_send(&self, item: Outbound) -> Result<(), TrySendError<Outbound>> {
        self.tx.try_send(item)
    }
}

/// userId -> live session handle, at most one per user.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sessions: DashMap<String, SessionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `user_id`, unconditionally replacing any prior
    /// handle. Returns the displaced handle.
    pub fn put(&self, user_id: impl Into<String>, handle: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(user_id.into(), handle)
    }

    /// Remove the entry for `user_id` only if it still holds session `id`.
    ///
    /// Returns `true` if an entry was removed. A stale session closing after
    /// it was replaced leaves the newer entry alone.
    pub fn remove(&self, user_id: &str, id: SessionId) -> bool {
        self.sessions
            .remove_if(user_id, |_, handle| handle.id == id)
            .is_some()
    }

    /// Current handle for `user_id`, if registered.
    pub fn get(&self, user_id: &str) -> Option<SessionHandle> {
        self.sessions.get_cloned(user_id)
    }

    /// Point-in-time snapshot of registered user ids, sorted ascending.
    pub fn list_user_ids(&self) -> Vec<String> {
        let mut ids = self.sessions.keys_cloned();
        ids.sort_unstable();
        ids
    }

    /// Snapshot of every registered handle.
    pub fn handles(&self) -> Vec<(String, SessionHandle)> {
        self.sessions.iter_cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SessionIdGenerator;

    fn handle(ids: &SessionIdGenerator) -> (SessionHandle, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(4);
        (SessionHandle::new(ids.next(), tx), rx)
    }

    #[test]
    fn test_put_replaces_and_returns_displaced() {
        let ids = SessionIdGenerator::new();
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = handle(&ids);
        let (second, _rx2) = handle(&ids);

        assert!(registry.put("mohammad", first.clone()).is_none());
        let displaced = registry.put("mohammad", second.clone()).unwrap();
        assert_eq!(displaced.id(), first.id());
        assert_eq!(registry.get("mohammad").unwrap().id(), second.id());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_stale_remove_keeps_newer_entry() {
        let ids = SessionIdGenerator::new();
        let registry = ConnectionRegistry::new();
        let (old, _rx1) = handle(&ids);
        let (new, _rx2) = handle(&ids);

        registry.put("khader", old.clone());
        registry.put("khader", new.clone());

        assert!(!registry.remove("khader", old.id()));
        assert_eq!(registry.get("khader").unwrap().id(), new.id());

        assert!(registry.remove("khader", new.id()));
        assert!(registry.get("khader").is_none());
        assert!(!registry.remove("khader", new.id()));
    }

    #[test]
    fn test_list_user_ids_is_sorted() {
        let ids = SessionIdGenerator::new();
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for user in ["mohammad", "alice", "khader"] {
            let (h, rx) = handle(&ids);
            registry.put(user, h);
            receivers.push(rx);
        }

        assert_eq!(registry.list_user_ids(), ["alice", "khader", "mohammad"]);
    }

    #[test]
    fn test_handle_reports_closed_writer() {
        let ids = SessionIdGenerator::new();
        let (h, rx) = handle(&ids);
        drop(rx);
        assert!(matches!(
            h.try_send(Outbound::Close(CloseReason::Normal)),
            Err(TrySendError::Closed(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_put_and_remove_leave_one_winner() {
        let ids = Arc::new(SessionIdGenerator::new());
        let registry = Arc::new(ConnectionRegistry::new());

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let ids = Arc::clone(&ids);
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(1);
                let h = SessionHandle::new(ids.next(), tx);
                registry.put("alice", h.clone());
                tokio::task::yield_now().await;
                registry.remove("alice", h.id());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // The last writer always removes its own handle.
        assert!(registry.is_empty());
    }
}
