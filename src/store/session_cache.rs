use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::logic::VariantSession;
use crate::model::{generate_id, Id};

/// Cache entry for an editing session
#[derive(Debug)]
struct CacheEntry {
    session: VariantSession,
    last_accessed: Instant,
}

/// In-memory store of live editing sessions with an idle TTL
#[derive(Debug, Clone)]
pub struct SessionCache {
    /// Sessions keyed by session ID
    entries: Arc<RwLock<HashMap<Id, CacheEntry>>>,
    /// Time-to-live since last access
    ttl: Duration,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Store a new session and return its ID
    pub async fn insert(&self, session: VariantSession) -> Id {
        let id = generate_id();
        let mut entries = self.entries.write().await;
        entries.insert(
            id.clone(),
            CacheEntry {
                session,
                last_accessed: Instant::now(),
            },
        );
        id
    }

    /// Run `f` against a session if present and not expired
    pub async fn with_session<F, R>(&self, id: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut VariantSession) -> R,
    {
        let mut entries = self.entries.write().await;

        let expired = match entries.get(id) {
            Some(entry) => entry.last_accessed.elapsed() > self.ttl,
            None => return None,
        };
        if expired {
            // dropping the session releases its previews
            entries.remove(id);
            return None;
        }

        let entry = entries.get_mut(id)?;
        entry.last_accessed = Instant::now();
        Some(f(&mut entry.session))
    }

    /// Remove a session from the cache
    pub async fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(id).is_some()
    }

    /// Drop every session idle for longer than the TTL
    pub async fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_accessed.elapsed() <= self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Evicted {} idle editing sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
