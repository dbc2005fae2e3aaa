use async_trait::async_trait;
use backoffice_application::{ActiveSession, SessionRepository};
use backoffice_core::{AppError, AppResult, EmployeeId, SessionId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed index of active employee sessions.
#[derive(Clone)]
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes sessions that expired before `before`.
    pub async fn purge_expired(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM employee_sessions
            WHERE expires_at IS NOT NULL AND expires_at <= $1
            "#,
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge expired sessions: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    session_id: String,
    employee_id: Uuid,
    expires_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for ActiveSession {
    type Error = AppError;

    fn try_from(row: SessionRow) -> AppResult<Self> {
        Ok(Self {
            session_id: SessionId::new(row.session_id)?,
            employee_id: EmployeeId::from_uuid(row.employee_id),
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn find_active_session(
        &self,
        session_id: &SessionId,
    ) -> AppResult<Option<ActiveSession>> {
        sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, employee_id, expires_at
            FROM employee_sessions
            WHERE session_id = $1
                AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(session_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find session: {error}")))?
        .map(ActiveSession::try_from)
        .transpose()
    }

    async fn list_active_sessions_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Vec<ActiveSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_id, employee_id, expires_at
            FROM employee_sessions
            WHERE employee_id = $1
                AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(employee_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list sessions of employee '{employee_id}': {error}"
            ))
        })?;

        rows.into_iter().map(ActiveSession::try_from).collect()
    }

    async fn save_session(&self, session: &ActiveSession) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO employee_sessions (session_id, employee_id, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (session_id) DO UPDATE
            SET employee_id = EXCLUDED.employee_id,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.session_id.as_str())
        .bind(session.employee_id.as_uuid())
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save session: {error}")))?;

        Ok(())
    }

    async fn revoke_session(&self, session_id: &SessionId) -> AppResult<()> {
        sqlx::query("DELETE FROM employee_sessions WHERE session_id = $1")
            .bind(session_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to revoke session: {error}")))?;

        Ok(())
    }
}
