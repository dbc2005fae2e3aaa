use std::sync::Arc;

use backoffice_core::{AppError, AppResult, DepartmentId, EmployeeId, NonEmptyString, PositionId};
use backoffice_domain::{
    AuditEntityType, DataScope, EmployeeScope, Grants, ModuleAllowList, PermissionAuditAction,
    PermissionContext, PermissionRequirement, diff_permissions,
};
use serde::Serialize;
use tracing::warn;

use crate::{
    CreatePositionInput, DepartmentModules, EmployeeAssignment, EmployeeAssignmentInput,
    InvalidationReport, PermissionAuditQuery, PermissionAuditRecord, PermissionAuditService,
    PermissionChangeInput, PermissionInvalidationService, PolicyStore, PositionPermissionsInput,
    PositionRecord,
};

const SYSTEM_MODULE: &str = "system";

/// Committed policy write plus the cache invalidation it triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyUpdate<T> {
    /// State after the write.
    pub record: T,
    /// Fan-out outcome.
    pub invalidation: InvalidationReport,
}

/// Mutates positions, assignments and department modules.
///
/// Every mutation commits first, then invalidates affected cache entries,
/// then appends an audit record.
#[derive(Clone)]
pub struct PolicyAdminService {
    policy_store: Arc<dyn PolicyStore>,
    audit_service: PermissionAuditService,
    invalidation_service: PermissionInvalidationService,
}

impl PolicyAdminService {
    /// Creates a policy administration service.
    #[must_use]
    pub fn new(
        policy_store: Arc<dyn PolicyStore>,
        audit_service: PermissionAuditService,
        invalidation_service: PermissionInvalidationService,
    ) -> Self {
        Self {
            policy_store,
            audit_service,
            invalidation_service,
        }
    }

    /// Creates a position. No session can hold it yet, so nothing is invalidated.
    pub async fn create_position(
        &self,
        actor: &PermissionContext,
        input: CreatePositionInput,
    ) -> AppResult<PositionRecord> {
        require_system_grant(actor, "position", "edit")?;
        let name = NonEmptyString::new(input.name.trim())?;

        let record = self
            .policy_store
            .create_position(CreatePositionInput {
                name: name.into(),
                ..input
            })
            .await?;

        self.audit_service
            .log_permission_change(PermissionChangeInput {
                entity_type: AuditEntityType::Position,
                entity_id: record.position_id.to_string(),
                action: PermissionAuditAction::PositionCreated,
                operator_id: actor.snapshot().employee_id(),
                operator_name: None,
                before: None,
                after: Some(to_audit_value(&record)?),
                detail: Some(format!(
                    "created position '{}' with {} data scope; {}",
                    record.name,
                    record.data_scope.as_str(),
                    diff_permissions(&Grants::new(), &record.permissions).summary()
                )),
            })
            .await?;

        Ok(record)
    }

    /// Replaces a position's grants, data scope and manage flag.
    ///
    /// Actors cannot edit their own position or hand out a wider scope than they hold.
    pub async fn update_position_permissions(
        &self,
        actor: &PermissionContext,
        position_id: PositionId,
        input: PositionPermissionsInput,
    ) -> AppResult<PolicyUpdate<PositionRecord>> {
        require_system_grant(actor, "position", "edit")?;
        if actor.snapshot().role().position_id == Some(position_id) {
            return Err(forbidden(actor, "cannot change the policy of its own position"));
        }
        require_scope_covers(actor, input.data_scope)?;

        let change = self
            .policy_store
            .update_position_permissions(position_id, input)
            .await?;

        let invalidation = self
            .invalidation_service
            .invalidate_by_position_id(position_id)
            .await
            .unwrap_or_else(|error| {
                warn!(
                    position_id = %position_id,
                    error = %error,
                    "failed to list position holders for invalidation"
                );
                InvalidationReport::default()
            });

        self.audit_service
            .log_permission_change(PermissionChangeInput {
                entity_type: AuditEntityType::Position,
                entity_id: position_id.to_string(),
                action: PermissionAuditAction::PositionPermissionsUpdated,
                operator_id: actor.snapshot().employee_id(),
                operator_name: None,
                before: Some(to_audit_value(&change.before)?),
                after: Some(to_audit_value(&change.after)?),
                detail: Some(position_change_detail(&change.before, &change.after)),
            })
            .await?;

        Ok(PolicyUpdate {
            record: change.after,
            invalidation,
        })
    }

    /// Replaces an employee's position and scope anchors.
    ///
    /// The employee must be inside the actor's data scope before and after the
    /// move. Actors cannot reassign themselves.
    pub async fn reassign_employee(
        &self,
        actor: &PermissionContext,
        employee_id: EmployeeId,
        input: EmployeeAssignmentInput,
    ) -> AppResult<PolicyUpdate<EmployeeAssignment>> {
        require_system_grant(actor, "employee", "assign")?;
        if employee_id == actor.snapshot().employee_id() {
            return Err(forbidden(actor, "cannot change its own assignment"));
        }

        let current = self
            .policy_store
            .find_employee_assignment(employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("employee '{employee_id}' was not found")))?;
        for anchors in [current.anchors, input.anchors] {
            if !actor.can_access_data(&EmployeeScope {
                employee_id,
                anchors,
            }) {
                return Err(forbidden(
                    actor,
                    &format!("cannot reassign employee '{employee_id}' outside its data scope"),
                ));
            }
        }

        self.ensure_assignment_targets_exist(actor, &input).await?;

        let change = self
            .policy_store
            .update_employee_assignment(employee_id, input)
            .await?;

        let invalidation = self
            .invalidation_service
            .invalidate_by_employee_id(employee_id)
            .await;

        self.audit_service
            .log_permission_change(PermissionChangeInput {
                entity_type: AuditEntityType::Employee,
                entity_id: employee_id.to_string(),
                action: PermissionAuditAction::EmployeeReassigned,
                operator_id: actor.snapshot().employee_id(),
                operator_name: None,
                before: Some(to_audit_value(&change.before)?),
                after: Some(to_audit_value(&change.after)?),
                detail: Some(assignment_change_detail(&change.before, &change.after)),
            })
            .await?;

        Ok(PolicyUpdate {
            record: change.after,
            invalidation,
        })
    }

    /// Replaces a department's module allow-list. Requires `all` data scope
    /// and a department other than the actor's own.
    pub async fn update_department_modules(
        &self,
        actor: &PermissionContext,
        department_id: DepartmentId,
        allowed_modules: ModuleAllowList,
    ) -> AppResult<PolicyUpdate<DepartmentModules>> {
        require_system_grant(actor, "department", "edit")?;
        if actor.snapshot().scope_anchors().group_id == Some(department_id) {
            return Err(forbidden(actor, "cannot change the modules of its own department"));
        }
        if actor.data_scope() != DataScope::All {
            return Err(forbidden(
                actor,
                &format!("cannot change department '{department_id}' outside its data scope"),
            ));
        }

        let change = self
            .policy_store
            .update_department_modules(department_id, allowed_modules)
            .await?;

        let invalidation = self
            .invalidation_service
            .invalidate_by_department_id(department_id)
            .await
            .unwrap_or_else(|error| {
                warn!(
                    department_id = %department_id,
                    error = %error,
                    "failed to list department members for invalidation"
                );
                InvalidationReport::default()
            });

        self.audit_service
            .log_permission_change(PermissionChangeInput {
                entity_type: AuditEntityType::Department,
                entity_id: department_id.to_string(),
                action: PermissionAuditAction::DepartmentModulesUpdated,
                operator_id: actor.snapshot().employee_id(),
                operator_name: None,
                before: Some(to_audit_value(&change.before)?),
                after: Some(to_audit_value(&change.after)?),
                detail: Some(format!(
                    "allowed modules [{}] -> [{}]",
                    change.before.allowed_modules.to_storage_values().join(", "),
                    change.after.allowed_modules.to_storage_values().join(", ")
                )),
            })
            .await?;

        Ok(PolicyUpdate {
            record: change.after,
            invalidation,
        })
    }

    /// Lists permission audit records.
    pub async fn list_permission_audit(
        &self,
        actor: &PermissionContext,
        query: PermissionAuditQuery,
    ) -> AppResult<Vec<PermissionAuditRecord>> {
        require_system_grant(actor, "audit", "view")?;
        self.audit_service.list(query).await
    }

    async fn ensure_assignment_targets_exist(
        &self,
        actor: &PermissionContext,
        input: &EmployeeAssignmentInput,
    ) -> AppResult<()> {
        if let Some(position_id) = input.position_id {
            let position = self
                .policy_store
                .find_position(position_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("position '{position_id}' was not found"))
                })?;
            require_scope_covers(actor, position.data_scope)?;
        }

        if let Some(department_id) = input.anchors.group_id
            && self
                .policy_store
                .find_department_modules(department_id)
                .await?
                .is_none()
        {
            return Err(AppError::NotFound(format!(
                "department '{department_id}' was not found"
            )));
        }

        Ok(())
    }
}

fn require_system_grant(
    actor: &PermissionContext,
    sub_module: &str,
    action: &str,
) -> AppResult<()> {
    let requirement = PermissionRequirement::action(SYSTEM_MODULE, sub_module, action);
    if actor.satisfies(&requirement) {
        return Ok(());
    }

    Err(forbidden(actor, &format!("is missing permission '{requirement}'")))
}

/// An actor may only hand out a data scope it holds itself.
fn require_scope_covers(actor: &PermissionContext, requested: DataScope) -> AppResult<()> {
    let held = actor.data_scope();
    if held == DataScope::All || held == requested || requested == DataScope::SelfOnly {
        return Ok(());
    }

    Err(forbidden(
        actor,
        &format!(
            "cannot grant {} data scope while holding {}",
            requested.as_str(),
            held.as_str()
        ),
    ))
}

fn forbidden(actor: &PermissionContext, reason: &str) -> AppError {
    AppError::Forbidden(format!(
        "employee '{}' {reason}",
        actor.snapshot().employee_id()
    ))
}

fn to_audit_value<T: Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|error| AppError::Internal(format!("failed to serialize audit state: {error}")))
}

fn position_change_detail(before: &PositionRecord, after: &PositionRecord) -> String {
    let mut parts = Vec::new();
    if before.data_scope != after.data_scope {
        parts.push(format!(
            "data scope {} -> {}",
            before.data_scope.as_str(),
            after.data_scope.as_str()
        ));
    }
    if before.can_manage_subordinates != after.can_manage_subordinates {
        parts.push(format!(
            "manage subordinates {} -> {}",
            before.can_manage_subordinates, after.can_manage_subordinates
        ));
    }
    parts.push(diff_permissions(&before.permissions, &after.permissions).summary());
    parts.join("; ")
}

fn assignment_change_detail(before: &EmployeeAssignment, after: &EmployeeAssignment) -> String {
    fn show<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "none".to_owned(), |value| value.to_string())
    }

    format!(
        "position {} -> {}; project {} -> {}; department {} -> {}",
        show(before.position_id),
        show(after.position_id),
        show(before.anchors.project_id),
        show(after.anchors.project_id),
        show(before.anchors.group_id),
        show(after.anchors.group_id),
    )
}
