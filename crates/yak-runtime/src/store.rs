//! Session persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::trace;
use yak_core::{Session, YakResult};

/// Storage backend for sessions.
///
/// The runtime reads a session once at the start of a call and writes it
/// back once at the end. Implementations need no locking beyond what keeps
/// individual `get`/`save` calls consistent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads a session by id.
    async fn get(&self, id: &str) -> YakResult<Option<Session>>;

    /// Stores a session under its id, replacing any previous value.
    async fn save(&self, session: &Session) -> YakResult<()>;
}

/// In-process store keeping each session as serialized JSON.
///
/// Every save and load goes through a serde round trip.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// The raw stored JSON of a session.
    pub fn raw(&self, id: &str) -> Option<String> {
        self.sessions.read().get(id).cloned()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &str) -> YakResult<Option<Session>> {
        let Some(raw) = self.raw(id) else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn save(&self, session: &Session) -> YakResult<()> {
        let raw = serde_json::to_string(session)?;
        trace!(session = session.id(), bytes = raw.len(), "Saving session");
        self.sessions.write().insert(session.id().to_owned(), raw);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_session() {
        let store = MemorySessionStore::new();
        assert!(store.get("nobody").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = MemorySessionStore::new();
        let mut session = Session::new("u1", "text");
        session.take_virgin();
        store.save(&session).await.unwrap();

        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(!loaded.is_virgin());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = MemorySessionStore::new();
        store.save(&Session::new("u1", "text")).await.unwrap();
        store.save(&Session::new("u1", "sms")).await.unwrap();

        let loaded = store.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.kind(), "sms");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_an_error() {
        let store = MemorySessionStore::new();
        store.sessions.write().insert("u1".into(), "{".into());
        assert!(store.get("u1").await.is_err());
    }
}
