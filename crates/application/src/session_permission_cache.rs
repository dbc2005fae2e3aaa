use std::sync::Arc;

use backoffice_core::SessionId;
use backoffice_domain::PermissionSnapshot;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::{ActiveSession, SessionCacheEntry, SessionPermissionCacheStore};

/// Fallback lifetime for entries whose session expiry is unknown.
pub const DEFAULT_PERMISSION_CACHE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A live entry for the session.
    Hit(Box<SessionCacheEntry>),
    /// No usable entry.
    Miss,
    /// The store failed; callers rebuild exactly as on a miss.
    Fault,
}

impl CacheLookup {
    /// Collapses the lookup into an entry or nothing.
    #[must_use]
    pub fn into_entry(self) -> Option<SessionCacheEntry> {
        match self {
            Self::Hit(entry) => Some(*entry),
            Self::Miss | Self::Fault => None,
        }
    }
}

/// Session-keyed snapshot cache that degrades every store failure to a miss or no-op.
#[derive(Clone)]
pub struct SessionPermissionCache {
    store: Arc<dyn SessionPermissionCacheStore>,
    default_ttl_seconds: u64,
}

impl SessionPermissionCache {
    /// Creates a cache over a store with the bounded default ttl.
    #[must_use]
    pub fn new(store: Arc<dyn SessionPermissionCacheStore>) -> Self {
        Self {
            store,
            default_ttl_seconds: DEFAULT_PERMISSION_CACHE_TTL_SECONDS,
        }
    }

    /// Overrides the ttl used when a session has no known expiry.
    #[must_use]
    pub fn with_default_ttl_seconds(mut self, default_ttl_seconds: u64) -> Self {
        self.default_ttl_seconds = default_ttl_seconds.max(1);
        self
    }

    /// Reads the entry of a session. Never fails.
    pub async fn get(&self, session_id: &SessionId) -> CacheLookup {
        let entry = match self.store.get_entry(session_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return CacheLookup::Miss,
            Err(error) => {
                warn!(
                    session_id = %session_id,
                    error = %error,
                    "permission cache read failed, rebuilding from policy store"
                );
                return CacheLookup::Fault;
            }
        };

        if &entry.session_id != session_id {
            warn!(
                session_id = %session_id,
                cached_session_id = %entry.session_id,
                "permission cache returned an entry for another session"
            );
            return CacheLookup::Fault;
        }

        if entry
            .expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now())
        {
            self.delete(session_id).await;
            return CacheLookup::Miss;
        }

        CacheLookup::Hit(Box::new(entry))
    }

    /// Stores a snapshot for a session with ttl equal to its remaining lifetime.
    ///
    /// Returns whether the entry was written.
    pub async fn set(&self, session: &ActiveSession, snapshot: PermissionSnapshot) -> bool {
        let Some(ttl_seconds) = self.ttl_seconds_for(session.expires_at, Utc::now()) else {
            return false;
        };

        let entry = SessionCacheEntry {
            session_id: session.session_id.clone(),
            employee_id: session.employee_id,
            expires_at: session.expires_at,
            snapshot,
        };

        match self.store.set_entry(&entry, ttl_seconds).await {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    session_id = %session.session_id,
                    error = %error,
                    "permission cache write failed"
                );
                false
            }
        }
    }

    /// Deletes one entry. Failures are logged.
    pub async fn delete(&self, session_id: &SessionId) -> bool {
        self.delete_many(std::slice::from_ref(session_id)).await
    }

    /// Deletes several entries. Returns `false` when the store failed.
    pub async fn delete_many(&self, session_ids: &[SessionId]) -> bool {
        if session_ids.is_empty() {
            return true;
        }

        match self.store.delete_entries(session_ids).await {
            Ok(()) => true,
            Err(error) => {
                warn!(
                    session_count = session_ids.len(),
                    error = %error,
                    "permission cache delete failed, entries stay until ttl expiry"
                );
                false
            }
        }
    }

    /// Remaining lifetime in seconds, `None` when the session already expired.
    #[must_use]
    pub fn ttl_seconds_for(
        &self,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        match expires_at {
            None => Some(self.default_ttl_seconds),
            Some(expires_at) => u64::try_from((expires_at - now).num_seconds())
                .ok()
                .filter(|seconds| *seconds > 0),
        }
    }
}
