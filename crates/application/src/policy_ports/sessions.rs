use async_trait::async_trait;
use backoffice_core::{AppResult, EmployeeId, SessionId};
use chrono::{DateTime, Utc};

/// Session index row linking a session to its employee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Session token.
    pub session_id: SessionId,
    /// Employee the session belongs to.
    pub employee_id: EmployeeId,
    /// Absolute session expiry; `None` when the session layer does not know it.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ActiveSession {
    /// Returns whether the session has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Session index indexed by session id and by employee.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session that has not expired.
    async fn find_active_session(&self, session_id: &SessionId) -> AppResult<Option<ActiveSession>>;

    /// Lists every non-expired session of an employee.
    async fn list_active_sessions_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Vec<ActiveSession>>;

    /// Inserts or replaces a session row.
    async fn save_session(&self, session: &ActiveSession) -> AppResult<()>;

    /// Removes a session row; removing an unknown session is a no-op.
    async fn revoke_session(&self, session_id: &SessionId) -> AppResult<()>;
}
