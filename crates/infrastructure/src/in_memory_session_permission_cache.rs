use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use backoffice_application::{SessionCacheEntry, SessionPermissionCacheStore};
use backoffice_core::{AppResult, SessionId};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredEntry {
    entry: SessionCacheEntry,
    expires_at: Instant,
}

/// In-memory session permission cache for single-node deployments.
#[derive(Default)]
pub struct InMemorySessionPermissionCache {
    entries: RwLock<HashMap<SessionId, StoredEntry>>,
}

impl InMemorySessionPermissionCache {
    /// Creates an empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionPermissionCacheStore for InMemorySessionPermissionCache {
    async fn get_entry(&self, session_id: &SessionId) -> AppResult<Option<SessionCacheEntry>> {
        {
            let entries = self.entries.read().await;
            match entries.get(session_id) {
                Some(stored) if stored.expires_at > Instant::now() => {
                    return Ok(Some(stored.entry.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(session_id)
            .is_some_and(|stored| stored.expires_at <= Instant::now())
        {
            entries.remove(session_id);
        }

        Ok(None)
    }

    async fn set_entry(&self, entry: &SessionCacheEntry, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(ttl_seconds))
            .unwrap_or(now);

        self.entries.write().await.insert(
            entry.session_id.clone(),
            StoredEntry {
                entry: entry.clone(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete_entries(&self, session_ids: &[SessionId]) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        for session_id in session_ids {
            entries.remove(session_id);
        }

        Ok(())
    }
}
