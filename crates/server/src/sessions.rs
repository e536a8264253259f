//! In-process registry of live chat sessions.
//!
//! The durable session state (owner + history) lives in the database; the
//! registry only tracks which sessions this process has seen and hands out
//! the per-session lock that serializes turns. A session that survives a
//! restart is re-admitted on its first message.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use maitred_core::domain::user::UserId;

pub struct SessionHandle {
    pub owner: UserId,
    /// Held for the duration of one turn; concurrent messages on the same
    /// session queue up behind it instead of interleaving history writes.
    pub turn_lock: Mutex<()>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<SessionHandle>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Register a session (idempotent). Returns the shared handle so the
    /// caller can take the turn lock.
    pub async fn admit(&self, session_id: &str, owner: UserId) -> Arc<SessionHandle> {
        let mut sessions = self.inner.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionHandle { owner, turn_lock: Mutex::new(()) }))
            .clone()
    }

    pub async fn resolve(&self, session_id: &str) -> Option<Arc<SessionHandle>> {
        self.inner.read().await.get(session_id).cloned()
    }

    pub async fn evict(&self, session_id: &str) {
        self.inner.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use maitred_core::domain::user::UserId;

    use super::SessionRegistry;

    #[tokio::test]
    async fn admit_is_idempotent_and_returns_the_same_handle() {
        let registry = SessionRegistry::new();
        let first = registry.admit("s-1", UserId(1)).await;
        let second = registry.admit("s-1", UserId(1)).await;

        assert!(std::sync::Arc::ptr_eq(&first, &second));
        assert_eq!(first.owner, UserId(1));
    }

    #[tokio::test]
    async fn evicted_sessions_no_longer_resolve() {
        let registry = SessionRegistry::new();
        registry.admit("s-1", UserId(1)).await;
        registry.evict("s-1").await;

        assert!(registry.resolve("s-1").await.is_none());
    }

    #[tokio::test]
    async fn turn_lock_serializes_access() {
        let registry = SessionRegistry::new();
        let handle = registry.admit("s-1", UserId(1)).await;

        let guard = handle.turn_lock.lock().await;
        assert!(handle.turn_lock.try_lock().is_err(), "second turn must wait");
        drop(guard);
        assert!(handle.turn_lock.try_lock().is_ok());
    }
}
