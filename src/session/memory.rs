use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::{SessionState, SessionStore};
use crate::error::Error;
use crate::types::SessionId;

struct Entry {
    state: SessionState,
    expires_at: Instant,
}

/// In-memory session store for local development and tests.
///
/// Expired entries are dropped lazily on access.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) sessions.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl SessionStore for MemoryStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionState>, Error> {
        let mut entries = self.entries.write().await;
        match entries.get(id.as_str()) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.state.clone())),
            Some(_) => {
                entries.remove(id.as_str());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save(&self, id: &SessionId, state: &SessionState, ttl: Duration) -> Result<(), Error> {
        let entry = Entry {
            state: state.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(id.as_str().to_owned(), entry);
        Ok(())
    }

    async fn destroy(&self, id: &SessionId) -> Result<(), Error> {
        self.entries.write().await.remove(id.as_str());
        Ok(())
    }

    async fn touch(&self, id: &SessionId, ttl: Duration) -> Result<(), Error> {
        if let Some(entry) = self.entries.write().await.get_mut(id.as_str()) {
            entry.expires_at = Instant::now() + ttl;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        SessionId(s.to_string())
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        store
            .save(&id("s1"), &SessionState::Anonymous, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded = store.load(&id("s1")).await.unwrap();
        assert!(matches!(loaded, Some(SessionState::Anonymous)));
    }

    #[tokio::test]
    async fn load_of_unknown_id_is_none() {
        let store = MemoryStore::new();
        assert!(store.load(&id("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let store = MemoryStore::new();
        store
            .save(&id("s1"), &SessionState::Anonymous, Duration::ZERO)
            .await
            .unwrap();
        assert!(store.load(&id("s1")).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn touch_extends_the_ttl() {
        let store = MemoryStore::new();
        store
            .save(&id("s1"), &SessionState::Anonymous, Duration::from_millis(1))
            .await
            .unwrap();
        store.touch(&id("s1"), Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(store.load(&id("s1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn destroy_removes_the_session() {
        let store = MemoryStore::new();
        store
            .save(&id("s1"), &SessionState::Anonymous, Duration::from_secs(60))
            .await
            .unwrap();
        store.destroy(&id("s1")).await.unwrap();
        assert!(store.load(&id("s1")).await.unwrap().is_none());
    }
}
