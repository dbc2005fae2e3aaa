use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use backoffice_application::{
    CreatePositionInput, EmployeeAssignmentInput, PositionPermissionsInput,
};
use backoffice_core::{DepartmentId, EmployeeId, PositionId};
use backoffice_domain::{ModuleAllowList, PermissionContext};

use crate::dto::{
    CreatePositionRequest, DepartmentModulesResponse, EmployeeAssignmentResponse,
    PositionResponse, ReassignEmployeeRequest, UpdateDepartmentModulesRequest,
    UpdatePositionPermissionsRequest, grants_from_payload, parse_data_scope,
};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_position_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Json(payload): Json<CreatePositionRequest>,
) -> ApiResult<(StatusCode, Json<PositionResponse>)> {
    let input = CreatePositionInput {
        name: payload.name,
        can_manage_subordinates: payload.can_manage_subordinates,
        data_scope: parse_data_scope(&payload.data_scope)?,
        permissions: grants_from_payload(payload.permissions)?,
    };

    let record = state
        .policy_admin_service
        .create_position(&context, input)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PositionResponse::new(record, None)),
    ))
}

pub async fn update_position_permissions_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Path(position_id): Path<String>,
    Json(payload): Json<UpdatePositionPermissionsRequest>,
) -> ApiResult<Json<PositionResponse>> {
    let position_id: PositionId = position_id.parse()?;
    let input = PositionPermissionsInput {
        can_manage_subordinates: payload.can_manage_subordinates,
        data_scope: parse_data_scope(&payload.data_scope)?,
        permissions: grants_from_payload(payload.permissions)?,
    };

    let update = state
        .policy_admin_service
        .update_position_permissions(&context, position_id, input)
        .await?;

    Ok(Json(PositionResponse::new(
        update.record,
        Some(update.invalidation),
    )))
}

pub async fn reassign_employee_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Path(employee_id): Path<String>,
    Json(payload): Json<ReassignEmployeeRequest>,
) -> ApiResult<Json<EmployeeAssignmentResponse>> {
    let employee_id: EmployeeId = employee_id.parse()?;
    let input = EmployeeAssignmentInput {
        position_id: payload.position_id()?,
        anchors: payload.anchors()?,
    };

    let update = state
        .policy_admin_service
        .reassign_employee(&context, employee_id, input)
        .await?;

    Ok(Json(EmployeeAssignmentResponse::new(
        update.record,
        Some(update.invalidation),
    )))
}

pub async fn update_department_modules_handler(
    State(state): State<AppState>,
    Extension(context): Extension<PermissionContext>,
    Path(department_id): Path<String>,
    Json(payload): Json<UpdateDepartmentModulesRequest>,
) -> ApiResult<Json<DepartmentModulesResponse>> {
    let department_id: DepartmentId = department_id.parse()?;
    let allowed_modules = ModuleAllowList::parse(&payload.allowed_modules)?;

    let update = state
        .policy_admin_service
        .update_department_modules(&context, department_id, allowed_modules)
        .await?;

    Ok(Json(DepartmentModulesResponse::new(
        update.record,
        update.invalidation,
    )))
}
