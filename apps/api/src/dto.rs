use std::collections::BTreeMap;

use backoffice_application::{
    DepartmentModules, EmployeeAssignment, InvalidationReport, PermissionAuditRecord,
    PositionRecord,
};
use backoffice_core::{AppResult, DepartmentId, PositionId, ProjectId};
use backoffice_domain::{
    ActionId, DataScope, Grants, ModuleId, PermissionContext, ScopeAnchors, SubModuleId,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Grants in wire form: module, then sub-module, then action list.
pub type GrantsPayload = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub postgres: &'static str,
}

/// Effective permissions of the calling session.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permissions-response.ts"
)]
pub struct PermissionsResponse {
    pub employee_id: String,
    pub position_id: Option<String>,
    pub data_scope: String,
    pub can_manage_subordinates: bool,
    pub project_id: Option<String>,
    pub department_id: Option<String>,
    pub grants: GrantsPayload,
    pub allowed_modules: Vec<String>,
    pub accessible_modules: Vec<String>,
}

impl From<&PermissionContext> for PermissionsResponse {
    fn from(context: &PermissionContext) -> Self {
        let snapshot = context.snapshot();
        let role = snapshot.role();
        let anchors = snapshot.scope_anchors();

        Self {
            employee_id: snapshot.employee_id().to_string(),
            position_id: role.position_id.map(|id| id.to_string()),
            data_scope: role.data_scope.as_str().to_owned(),
            can_manage_subordinates: role.can_manage_subordinates,
            project_id: anchors.project_id.map(|id| id.to_string()),
            department_id: anchors.group_id.map(|id| id.to_string()),
            grants: grants_to_payload(&role.grants),
            allowed_modules: snapshot.allowed_modules().to_storage_values(),
            accessible_modules: context
                .accessible_modules()
                .into_iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Incoming payload for position creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-position-request.ts"
)]
pub struct CreatePositionRequest {
    pub name: String,
    #[serde(default)]
    pub can_manage_subordinates: bool,
    pub data_scope: String,
    #[serde(default)]
    pub permissions: GrantsPayload,
}

/// Incoming payload replacing a position's policy.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-position-permissions-request.ts"
)]
pub struct UpdatePositionPermissionsRequest {
    #[serde(default)]
    pub can_manage_subordinates: bool,
    pub data_scope: String,
    #[serde(default)]
    pub permissions: GrantsPayload,
}

/// Incoming payload replacing an employee's assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/reassign-employee-request.ts"
)]
pub struct ReassignEmployeeRequest {
    pub position_id: Option<String>,
    pub project_id: Option<String>,
    pub department_id: Option<String>,
}

impl ReassignEmployeeRequest {
    pub fn position_id(&self) -> AppResult<Option<PositionId>> {
        self.position_id.as_deref().map(str::parse).transpose()
    }

    pub fn anchors(&self) -> AppResult<ScopeAnchors> {
        Ok(ScopeAnchors {
            project_id: self
                .project_id
                .as_deref()
                .map(str::parse::<ProjectId>)
                .transpose()?,
            group_id: self
                .department_id
                .as_deref()
                .map(str::parse::<DepartmentId>)
                .transpose()?,
        })
    }
}

/// Incoming payload replacing a department's module allow-list.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/update-department-modules-request.ts"
)]
pub struct UpdateDepartmentModulesRequest {
    pub allowed_modules: Vec<String>,
}

/// Cache invalidation triggered by a policy write.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/invalidation-response.ts"
)]
pub struct InvalidationResponse {
    pub employees: usize,
    pub sessions: usize,
    pub failed_employees: usize,
    pub cache_faults: usize,
}

impl From<InvalidationReport> for InvalidationResponse {
    fn from(value: InvalidationReport) -> Self {
        Self {
            employees: value.employees,
            sessions: value.sessions,
            failed_employees: value.failed_employees,
            cache_faults: value.cache_faults,
        }
    }
}

/// API representation of a position.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/position-response.ts"
)]
pub struct PositionResponse {
    pub position_id: String,
    pub name: String,
    pub can_manage_subordinates: bool,
    pub data_scope: String,
    pub permissions: GrantsPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub invalidation: Option<InvalidationResponse>,
}

impl PositionResponse {
    pub fn new(record: PositionRecord, invalidation: Option<InvalidationReport>) -> Self {
        Self {
            position_id: record.position_id.to_string(),
            name: record.name,
            can_manage_subordinates: record.can_manage_subordinates,
            data_scope: record.data_scope.as_str().to_owned(),
            permissions: grants_to_payload(&record.permissions),
            invalidation: invalidation.map(InvalidationResponse::from),
        }
    }
}

/// API representation of an employee assignment.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/employee-assignment-response.ts"
)]
pub struct EmployeeAssignmentResponse {
    pub employee_id: String,
    pub display_name: String,
    pub position_id: Option<String>,
    pub project_id: Option<String>,
    pub department_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub invalidation: Option<InvalidationResponse>,
}

impl EmployeeAssignmentResponse {
    pub fn new(record: EmployeeAssignment, invalidation: Option<InvalidationReport>) -> Self {
        Self {
            employee_id: record.employee_id.to_string(),
            display_name: record.display_name,
            position_id: record.position_id.map(|id| id.to_string()),
            project_id: record.anchors.project_id.map(|id| id.to_string()),
            department_id: record.anchors.group_id.map(|id| id.to_string()),
            invalidation: invalidation.map(InvalidationResponse::from),
        }
    }
}

/// API representation of a department allow-list.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/department-modules-response.ts"
)]
pub struct DepartmentModulesResponse {
    pub department_id: String,
    pub allowed_modules: Vec<String>,
    pub invalidation: InvalidationResponse,
}

impl DepartmentModulesResponse {
    pub fn new(record: DepartmentModules, invalidation: InvalidationReport) -> Self {
        Self {
            department_id: record.department_id.to_string(),
            allowed_modules: record.allowed_modules.to_storage_values(),
            invalidation: InvalidationResponse::from(invalidation),
        }
    }
}

/// API representation of one permission audit record.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-audit-record-response.ts"
)]
pub struct PermissionAuditRecordResponse {
    pub record_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub action: String,
    pub operator_id: String,
    pub operator_name: String,
    #[ts(type = "unknown")]
    pub before: Option<serde_json::Value>,
    #[ts(type = "unknown")]
    pub after: Option<serde_json::Value>,
    pub detail: Option<String>,
    pub occurred_at: String,
}

impl From<PermissionAuditRecord> for PermissionAuditRecordResponse {
    fn from(value: PermissionAuditRecord) -> Self {
        Self {
            record_id: value.record_id,
            entity_type: value.entity_type.as_str().to_owned(),
            entity_id: value.entity_id,
            action: value.action.as_str().to_owned(),
            operator_id: value.operator_id.to_string(),
            operator_name: value.operator_name,
            before: value.before,
            after: value.after,
            detail: value.detail,
            occurred_at: value.occurred_at.to_rfc3339(),
        }
    }
}

pub fn grants_to_payload(grants: &Grants) -> GrantsPayload {
    grants
        .iter()
        .map(|(module, sub_modules)| {
            let sub_modules = sub_modules
                .iter()
                .map(|(sub_module, actions)| {
                    (
                        sub_module.to_string(),
                        actions.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect();
            (module.to_string(), sub_modules)
        })
        .collect()
}

pub fn grants_from_payload(payload: GrantsPayload) -> AppResult<Grants> {
    let mut grants = Grants::new();
    for (module, sub_modules) in payload {
        let module = ModuleId::new(module)?;
        for (sub_module, actions) in sub_modules {
            let sub_module = SubModuleId::new(sub_module)?;
            for action in actions {
                grants.grant(module.clone(), sub_module.clone(), ActionId::new(action)?);
            }
        }
    }

    Ok(grants)
}

pub fn parse_data_scope(value: &str) -> AppResult<DataScope> {
    value.trim().parse()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use backoffice_core::AppError;

    use super::{GrantsPayload, ReassignEmployeeRequest, grants_from_payload, grants_to_payload};

    #[test]
    fn grants_payload_converts_both_ways() {
        let payload: GrantsPayload = BTreeMap::from([(
            "finance.flow".to_owned(),
            BTreeMap::from([(
                "claims".to_owned(),
                vec!["approve".to_owned(), "view".to_owned()],
            )]),
        )]);

        let Ok(grants) = grants_from_payload(payload.clone()) else {
            panic!("payload should convert");
        };

        assert!(grants.actions("finance.flow", "claims").is_some());
        assert_eq!(grants_to_payload(&grants), payload);
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        let payload: GrantsPayload = BTreeMap::from([(
            "hr".to_owned(),
            BTreeMap::from([("leave".to_owned(), vec!["drop table".to_owned()])]),
        )]);

        assert!(matches!(
            grants_from_payload(payload),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn reassignment_ids_must_be_uuids() {
        let request = ReassignEmployeeRequest {
            position_id: Some("not-a-uuid".to_owned()),
            project_id: None,
            department_id: None,
        };

        assert!(request.position_id().is_err());
        assert!(matches!(request.anchors(), Ok(anchors) if anchors.project_id.is_none()));
    }
}
