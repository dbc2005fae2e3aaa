use async_trait::async_trait;
use backoffice_application::{
    CreatePositionInput, DepartmentModules, EmployeeAssignment, EmployeeAssignmentInput,
    PolicyChange, PolicyStore, PositionPermissionsInput, PositionRecord,
};
use backoffice_core::{
    AppError, AppResult, DepartmentId, EmployeeId, PositionId, ProjectId,
};
use backoffice_domain::{DataScope, Grants, ModuleAllowList, ScopeAnchors};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::warn;
use uuid::Uuid;

/// PostgreSQL-backed policy store.
#[derive(Clone)]
pub struct PostgresPolicyStore {
    pool: PgPool,
}

impl PostgresPolicyStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin policy transaction: {error}"))
        })
    }
}

#[derive(Debug, FromRow)]
struct PositionRow {
    id: Uuid,
    name: String,
    can_manage_subordinates: bool,
    data_scope: String,
    permissions: Value,
}

impl PositionRow {
    fn into_record(self) -> AppResult<PositionRecord> {
        let data_scope = self.data_scope.parse::<DataScope>().unwrap_or_else(|error| {
            warn!(
                position_id = %self.id,
                data_scope = %self.data_scope,
                error = %error,
                "stored data scope is invalid, falling back to self"
            );
            DataScope::SelfOnly
        });
        let permissions: Grants = serde_json::from_value(self.permissions).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored permissions for position '{}': {error}",
                self.id
            ))
        })?;

        Ok(PositionRecord {
            position_id: PositionId::from_uuid(self.id),
            name: self.name,
            can_manage_subordinates: self.can_manage_subordinates,
            data_scope,
            permissions,
        })
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: Uuid,
    display_name: String,
    position_id: Option<Uuid>,
    project_id: Option<Uuid>,
    department_id: Option<Uuid>,
}

impl From<EmployeeRow> for EmployeeAssignment {
    fn from(row: EmployeeRow) -> Self {
        Self {
            employee_id: EmployeeId::from_uuid(row.id),
            display_name: row.display_name,
            position_id: row.position_id.map(PositionId::from_uuid),
            anchors: ScopeAnchors {
                project_id: row.project_id.map(ProjectId::from_uuid),
                group_id: row.department_id.map(DepartmentId::from_uuid),
            },
        }
    }
}

#[derive(Debug, FromRow)]
struct DepartmentRow {
    id: Uuid,
    allowed_modules: Value,
}

impl From<DepartmentRow> for DepartmentModules {
    fn from(row: DepartmentRow) -> Self {
        let allowed_modules = serde_json::from_value::<Vec<String>>(row.allowed_modules)
            .map_err(|error| AppError::Internal(error.to_string()))
            .and_then(ModuleAllowList::parse)
            .unwrap_or_else(|error| {
                warn!(
                    department_id = %row.id,
                    error = %error,
                    "stored module allow-list is invalid, denying all modules"
                );
                ModuleAllowList::new(Vec::new())
            });

        Self {
            department_id: DepartmentId::from_uuid(row.id),
            allowed_modules,
        }
    }
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    async fn find_position(&self, position_id: PositionId) -> AppResult<Option<PositionRecord>> {
        sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT id, name, can_manage_subordinates, data_scope, permissions
            FROM positions
            WHERE id = $1
            "#,
        )
        .bind(position_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find position '{position_id}': {error}"))
        })?
        .map(PositionRow::into_record)
        .transpose()
    }

    async fn find_employee_assignment(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Option<EmployeeAssignment>> {
        let row = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, display_name, position_id, project_id, department_id
            FROM employees
            WHERE id = $1
            "#,
        )
        .bind(employee_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find employee '{employee_id}': {error}"))
        })?;

        Ok(row.map(EmployeeAssignment::from))
    }

    async fn find_department_modules(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Option<DepartmentModules>> {
        let row = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, allowed_modules
            FROM departments
            WHERE id = $1
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to find department '{department_id}': {error}"
            ))
        })?;

        Ok(row.map(DepartmentModules::from))
    }

    async fn list_employees_by_position(
        &self,
        position_id: PositionId,
    ) -> AppResult<Vec<EmployeeId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM employees
            WHERE position_id = $1
            "#,
        )
        .bind(position_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list holders of position '{position_id}': {error}"
            ))
        })?;

        Ok(ids.into_iter().map(EmployeeId::from_uuid).collect())
    }

    async fn list_employees_by_department(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Vec<EmployeeId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM employees
            WHERE department_id = $1
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list members of department '{department_id}': {error}"
            ))
        })?;

        Ok(ids.into_iter().map(EmployeeId::from_uuid).collect())
    }

    async fn create_position(&self, input: CreatePositionInput) -> AppResult<PositionRecord> {
        let permissions = grants_to_json(&input.permissions)?;
        let row = sqlx::query_as::<_, PositionRow>(
            r#"
            INSERT INTO positions (id, name, can_manage_subordinates, data_scope, permissions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, can_manage_subordinates, data_scope, permissions
            "#,
        )
        .bind(PositionId::new().as_uuid())
        .bind(input.name.as_str())
        .bind(input.can_manage_subordinates)
        .bind(input.data_scope.as_str())
        .bind(permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_position_conflict(error, input.name.as_str()))?;

        row.into_record()
    }

    async fn update_position_permissions(
        &self,
        position_id: PositionId,
        input: PositionPermissionsInput,
    ) -> AppResult<PolicyChange<PositionRecord>> {
        let permissions = grants_to_json(&input.permissions)?;
        let mut transaction = self.begin().await?;

        let before = sqlx::query_as::<_, PositionRow>(
            r#"
            SELECT id, name, can_manage_subordinates, data_scope, permissions
            FROM positions
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(position_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock position '{position_id}': {error}"))
        })?
        .ok_or_else(|| AppError::NotFound(format!("position '{position_id}' was not found")))?
        .into_record()?;

        let after = sqlx::query_as::<_, PositionRow>(
            r#"
            UPDATE positions
            SET can_manage_subordinates = $2,
                data_scope = $3,
                permissions = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING id, name, can_manage_subordinates, data_scope, permissions
            "#,
        )
        .bind(position_id.as_uuid())
        .bind(input.can_manage_subordinates)
        .bind(input.data_scope.as_str())
        .bind(permissions)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update position '{position_id}': {error}"
            ))
        })?
        .into_record()?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit position '{position_id}' update: {error}"
            ))
        })?;

        Ok(PolicyChange { before, after })
    }

    async fn update_employee_assignment(
        &self,
        employee_id: EmployeeId,
        input: EmployeeAssignmentInput,
    ) -> AppResult<PolicyChange<EmployeeAssignment>> {
        let mut transaction = self.begin().await?;

        let before = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, display_name, position_id, project_id, department_id
            FROM employees
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(employee_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock employee '{employee_id}': {error}"))
        })?
        .map(EmployeeAssignment::from)
        .ok_or_else(|| AppError::NotFound(format!("employee '{employee_id}' was not found")))?;

        let after = sqlx::query_as::<_, EmployeeRow>(
            r#"
            UPDATE employees
            SET position_id = $2,
                project_id = $3,
                department_id = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING id, display_name, position_id, project_id, department_id
            "#,
        )
        .bind(employee_id.as_uuid())
        .bind(input.position_id.map(|id| id.as_uuid()))
        .bind(input.anchors.project_id.map(|id| id.as_uuid()))
        .bind(input.anchors.group_id.map(|id| id.as_uuid()))
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_assignment_error(error, employee_id))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit employee '{employee_id}' assignment: {error}"
            ))
        })?;

        Ok(PolicyChange {
            before,
            after: EmployeeAssignment::from(after),
        })
    }

    async fn update_department_modules(
        &self,
        department_id: DepartmentId,
        allowed_modules: ModuleAllowList,
    ) -> AppResult<PolicyChange<DepartmentModules>> {
        let mut transaction = self.begin().await?;

        let before = sqlx::query_as::<_, DepartmentRow>(
            r#"
            SELECT id, allowed_modules
            FROM departments
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(department_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to lock department '{department_id}': {error}"
            ))
        })?
        .map(DepartmentModules::from)
        .ok_or_else(|| {
            AppError::NotFound(format!("department '{department_id}' was not found"))
        })?;

        let after = sqlx::query_as::<_, DepartmentRow>(
            r#"
            UPDATE departments
            SET allowed_modules = $2,
                updated_at = now()
            WHERE id = $1
            RETURNING id, allowed_modules
            "#,
        )
        .bind(department_id.as_uuid())
        .bind(Value::from(allowed_modules.to_storage_values()))
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to update department '{department_id}' modules: {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit department '{department_id}' update: {error}"
            ))
        })?;

        Ok(PolicyChange {
            before,
            after: DepartmentModules::from(after),
        })
    }
}

fn grants_to_json(grants: &Grants) -> AppResult<Value> {
    serde_json::to_value(grants)
        .map_err(|error| AppError::Internal(format!("failed to serialize grants: {error}")))
}

fn map_position_conflict(error: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("position '{name}' already exists"));
    }

    AppError::Internal(format!("failed to create position '{name}': {error}"))
}

fn map_assignment_error(error: sqlx::Error, employee_id: EmployeeId) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23503")
    {
        return AppError::NotFound(format!(
            "assignment of employee '{employee_id}' references an unknown position or department"
        ));
    }

    AppError::Internal(format!(
        "failed to update employee '{employee_id}' assignment: {error}"
    ))
}
