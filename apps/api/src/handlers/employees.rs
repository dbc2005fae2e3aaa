use axum::Json;
use axum::extract::{Extension, Query, State};
use backoffice_domain::{PermissionContext, PermissionRequirement};
use backoffice_infrastructure::PostgresEmployeeDirectory;
use serde::Deserialize;

use crate::dto::EmployeeAssignmentResponse;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmployeeListParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Lists employees visible under the caller's data scope.
pub async fn list_employees_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Query(params): Query<EmployeeListParams>,
) -> ApiResult<Json<Vec<EmployeeAssignmentResponse>>> {
    state.permission_service.require_permission(
        &context,
        &PermissionRequirement::action("system", "employee", "view"),
    )?;

    let columns = PostgresEmployeeDirectory::scope_columns()?;
    let predicate = state
        .permission_service
        .data_scope_filter(&context, &columns)?;

    let employees = state
        .employee_directory
        .list_visible_employees(
            &predicate,
            params.limit.unwrap_or(50).clamp(1, 200),
            params.offset.unwrap_or(0),
        )
        .await?
        .into_iter()
        .map(|employee| EmployeeAssignmentResponse::new(employee, None))
        .collect();

    Ok(Json(employees))
}
