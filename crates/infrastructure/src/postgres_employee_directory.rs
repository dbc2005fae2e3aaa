use async_trait::async_trait;
use backoffice_application::{EmployeeAssignment, EmployeeDirectory};
use backoffice_core::{AppError, AppResult, DepartmentId, EmployeeId, PositionId, ProjectId};
use backoffice_domain::{DataScopeColumns, DataScopePredicate, ScopeAnchors};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::push_data_scope_predicate;

/// PostgreSQL-backed employee directory honoring data-scope predicates.
#[derive(Clone)]
pub struct PostgresEmployeeDirectory {
    pool: PgPool,
}

impl PostgresEmployeeDirectory {
    /// Creates a directory with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Column mapping of the `employees` table.
    pub fn scope_columns() -> AppResult<DataScopeColumns> {
        DataScopeColumns::new()
            .owner("id")?
            .group("department_id")?
            .project("project_id")
    }
}

#[derive(Debug, FromRow)]
struct DirectoryRow {
    id: Uuid,
    display_name: String,
    position_id: Option<Uuid>,
    project_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

#[async_trait]
impl EmployeeDirectory for PostgresEmployeeDirectory {
    async fn list_visible_employees(
        &self,
        predicate: &DataScopePredicate,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<EmployeeAssignment>> {
        if predicate.is_deny_all() {
            return Ok(Vec::new());
        }

        let capped_limit = limit.clamp(1, 200) as i64;
        let capped_offset = offset.min(5_000) as i64;

        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT id, display_name, position_id, project_id, department_id FROM employees WHERE ",
        );
        push_data_scope_predicate(&mut builder, predicate);
        builder.push(" ORDER BY display_name, id LIMIT ");
        builder.push_bind(capped_limit);
        builder.push(" OFFSET ");
        builder.push_bind(capped_offset);

        let rows = builder
            .build_query_as::<DirectoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to list visible employees: {error}"))
            })?;

        Ok(rows
            .into_iter()
            .map(|row| EmployeeAssignment {
                employee_id: EmployeeId::from_uuid(row.id),
                display_name: row.display_name,
                position_id: row.position_id.map(PositionId::from_uuid),
                anchors: ScopeAnchors {
                    project_id: row.project_id.map(ProjectId::from_uuid),
                    group_id: row.department_id.map(DepartmentId::from_uuid),
                },
            })
            .collect())
    }
}
