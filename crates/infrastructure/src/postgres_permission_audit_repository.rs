use async_trait::async_trait;
use backoffice_application::{
    NewPermissionAuditRecord, PermissionAuditQuery, PermissionAuditRecord,
    PermissionAuditRepository,
};
use backoffice_core::{AppError, AppResult, EmployeeId};
use backoffice_domain::{AuditEntityType, PermissionAuditAction};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed append-only permission audit trail.
#[derive(Clone)]
pub struct PostgresPermissionAuditRepository {
    pool: PgPool,
}

impl PostgresPermissionAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PermissionAuditRow {
    id: Uuid,
    entity_type: String,
    entity_id: String,
    action: String,
    operator_id: Uuid,
    operator_name: String,
    before_state: Option<Value>,
    after_state: Option<Value>,
    detail: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<PermissionAuditRow> for PermissionAuditRecord {
    type Error = AppError;

    fn try_from(row: PermissionAuditRow) -> AppResult<Self> {
        let entity_type = row.entity_type.parse::<AuditEntityType>().map_err(|error| {
            AppError::Internal(format!("invalid audit record '{}': {error}", row.id))
        })?;
        let action = row.action.parse::<PermissionAuditAction>().map_err(|error| {
            AppError::Internal(format!("invalid audit record '{}': {error}", row.id))
        })?;

        Ok(Self {
            record_id: row.id.to_string(),
            entity_type,
            entity_id: row.entity_id,
            action,
            operator_id: EmployeeId::from_uuid(row.operator_id),
            operator_name: row.operator_name,
            before: row.before_state,
            after: row.after_state,
            detail: row.detail,
            occurred_at: row.occurred_at,
        })
    }
}

#[async_trait]
impl PermissionAuditRepository for PostgresPermissionAuditRepository {
    async fn append_record(&self, record: NewPermissionAuditRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO permission_audit_records (
                id,
                entity_type,
                entity_id,
                action,
                operator_id,
                operator_name,
                before_state,
                after_state,
                detail,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.entity_type.as_str())
        .bind(record.entity_id.as_str())
        .bind(record.action.as_str())
        .bind(record.operator_id.as_uuid())
        .bind(record.operator_name.as_str())
        .bind(record.before)
        .bind(record.after)
        .bind(record.detail)
        .bind(record.occurred_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to append permission audit record: {error}"))
        })?;

        Ok(())
    }

    async fn list_records(
        &self,
        query: PermissionAuditQuery,
    ) -> AppResult<Vec<PermissionAuditRecord>> {
        let capped_limit = query.limit.clamp(1, 200) as i64;
        let capped_offset = query.offset.min(5_000) as i64;
        let rows = sqlx::query_as::<_, PermissionAuditRow>(
            r#"
            SELECT
                id,
                entity_type,
                entity_id,
                action,
                operator_id,
                operator_name,
                before_state,
                after_state,
                detail,
                occurred_at
            FROM permission_audit_records
            WHERE ($1::TEXT IS NULL OR entity_type = $1)
                AND ($2::TEXT IS NULL OR entity_id = $2)
                AND ($3::TEXT IS NULL OR action = $3)
            ORDER BY occurred_at DESC, id DESC
            LIMIT $4
            OFFSET $5
            "#,
        )
        .bind(query.entity_type.map(|entity_type| entity_type.as_str()))
        .bind(query.entity_id)
        .bind(query.action.map(|action| action.as_str()))
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list permission audit records: {error}"))
        })?;

        rows.into_iter().map(PermissionAuditRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use backoffice_application::{
        NewPermissionAuditRecord, PermissionAuditQuery, PermissionAuditRepository,
    };
    use backoffice_core::EmployeeId;
    use backoffice_domain::{AuditEntityType, PermissionAuditAction};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    use super::PostgresPermissionAuditRepository;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for postgres permission audit tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn entity_history_is_listed_newest_first() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let repository = PostgresPermissionAuditRepository::new(pool);
        let entity_id = Uuid::new_v4().to_string();
        let operator_id = EmployeeId::new();
        let now = Utc::now();

        for (offset, action) in [
            (2, PermissionAuditAction::PositionCreated),
            (1, PermissionAuditAction::PositionPermissionsUpdated),
        ] {
            let appended = repository
                .append_record(NewPermissionAuditRecord {
                    entity_type: AuditEntityType::Position,
                    entity_id: entity_id.clone(),
                    action,
                    operator_id,
                    operator_name: "Grace".to_owned(),
                    before: None,
                    after: Some(json!({ "data_scope": "group" })),
                    detail: Some("+hr".to_owned()),
                    occurred_at: now - Duration::minutes(offset),
                })
                .await;
            assert!(appended.is_ok());
        }

        let Ok(records) = repository
            .list_records(PermissionAuditQuery {
                entity_type: Some(AuditEntityType::Position),
                entity_id: Some(entity_id.clone()),
                action: None,
                limit: 10,
                offset: 0,
            })
            .await
        else {
            panic!("records should list");
        };

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].action,
            PermissionAuditAction::PositionPermissionsUpdated
        );
        assert_eq!(records[1].action, PermissionAuditAction::PositionCreated);
        assert_eq!(records[0].after, Some(json!({ "data_scope": "group" })));
        assert_eq!(records[0].operator_id, operator_id);

        let Ok(page) = repository
            .list_records(PermissionAuditQuery {
                entity_type: Some(AuditEntityType::Position),
                entity_id: Some(entity_id),
                action: Some(PermissionAuditAction::PositionCreated),
                limit: 0,
                offset: 0,
            })
            .await
        else {
            panic!("records should list");
        };
        assert_eq!(page.len(), 1);
    }
}
