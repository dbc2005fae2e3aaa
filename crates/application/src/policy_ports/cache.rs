use async_trait::async_trait;
use backoffice_core::{AppResult, EmployeeId, SessionId};
use backoffice_domain::PermissionSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached snapshot plus the session metadata it was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCacheEntry {
    /// Session token the entry is keyed by.
    pub session_id: SessionId,
    /// Employee the snapshot was built for.
    pub employee_id: EmployeeId,
    /// Session expiry the TTL was derived from.
    pub expires_at: Option<DateTime<Utc>>,
    /// Cached policy snapshot.
    pub snapshot: PermissionSnapshot,
}

/// Key-value store port for session permission entries.
#[async_trait]
pub trait SessionPermissionCacheStore: Send + Sync {
    /// Reads one entry.
    async fn get_entry(&self, session_id: &SessionId) -> AppResult<Option<SessionCacheEntry>>;

    /// Fully replaces one entry with a ttl.
    async fn set_entry(&self, entry: &SessionCacheEntry, ttl_seconds: u64) -> AppResult<()>;

    /// Deletes entries; unknown keys are ignored.
    async fn delete_entries(&self, session_ids: &[SessionId]) -> AppResult<()>;
}
