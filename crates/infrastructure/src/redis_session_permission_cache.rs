//! Redis-backed session permission cache store.

use async_trait::async_trait;
use backoffice_application::{SessionCacheEntry, SessionPermissionCacheStore};
use backoffice_core::{AppError, AppResult, SessionId};
use redis::AsyncCommands;

/// Redis implementation of the session permission cache store port.
///
/// Entries are JSON documents under `<prefix>:<session id>` written with
/// `SET EX`, so Redis drops them when the session would have expired.
#[derive(Clone)]
pub struct RedisSessionPermissionCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSessionPermissionCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, session_id: &SessionId) -> String {
        format!("{}:{}", self.key_prefix, session_id.as_str())
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl SessionPermissionCacheStore for RedisSessionPermissionCache {
    async fn get_entry(&self, session_id: &SessionId) -> AppResult<Option<SessionCacheEntry>> {
        let mut connection = self.connection().await?;
        let encoded: Option<String> =
            connection
                .get(self.key_for(session_id))
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to read session permission cache entry: {error}"
                    ))
                })?;

        encoded.as_deref().map(decode_entry).transpose()
    }

    async fn set_entry(&self, entry: &SessionCacheEntry, ttl_seconds: u64) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let value = encode_entry(entry)?;
        let mut connection = self.connection().await?;

        connection
            .set_ex(self.key_for(&entry.session_id), value, ttl_seconds)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write session permission cache entry: {error}"
                ))
            })
    }

    async fn delete_entries(&self, session_ids: &[SessionId]) -> AppResult<()> {
        if session_ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = session_ids
            .iter()
            .map(|session_id| self.key_for(session_id))
            .collect();
        let mut connection = self.connection().await?;

        connection.del(keys).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to delete session permission cache entries: {error}"
            ))
        })
    }
}

fn encode_entry(entry: &SessionCacheEntry) -> AppResult<String> {
    serde_json::to_string(entry).map_err(|error| {
        AppError::Internal(format!(
            "failed to encode session permission cache entry: {error}"
        ))
    })
}

fn decode_entry(value: &str) -> AppResult<SessionCacheEntry> {
    serde_json::from_str(value).map_err(|error| {
        AppError::Internal(format!("invalid session permission cache entry: {error}"))
    })
}
