use std::time::Duration;

use backoffice_infrastructure::PostgresSessionRepository;
use chrono::Utc;
use tracing::{error, info};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Periodically deletes expired session index rows.
pub fn spawn_session_purge(sessions: PostgresSessionRepository) {
    tokio::spawn(async move {
        info!(
            interval_seconds = SESSION_PURGE_INTERVAL.as_secs(),
            "session purge worker started"
        );

        loop {
            match sessions.purge_expired(Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired sessions"),
                Err(error) => error!(error = %error, "session purge failed"),
            }

            tokio::time::sleep(SESSION_PURGE_INTERVAL).await;
        }
    });
}
