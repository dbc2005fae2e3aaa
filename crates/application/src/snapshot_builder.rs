use std::sync::Arc;

use backoffice_core::{AppError, AppResult, DepartmentId, EmployeeId, PositionId};
use backoffice_domain::{ModuleAllowList, PermissionSnapshot, RolePolicy};
use chrono::Utc;
use tracing::warn;

use crate::PolicyStore;

/// Assembles immutable permission snapshots from the policy store.
#[derive(Clone)]
pub struct PermissionSnapshotBuilder {
    policy_store: Arc<dyn PolicyStore>,
}

impl PermissionSnapshotBuilder {
    /// Creates a builder reading from a policy store.
    #[must_use]
    pub fn new(policy_store: Arc<dyn PolicyStore>) -> Self {
        Self { policy_store }
    }

    /// Builds a fresh snapshot for one employee.
    ///
    /// Employees without a position get an empty policy. Employees without a
    /// department are not module-restricted; a dangling department reference
    /// restricts everything.
    pub async fn build(&self, employee_id: EmployeeId) -> AppResult<PermissionSnapshot> {
        let assignment = self
            .policy_store
            .find_employee_assignment(employee_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("employee '{employee_id}' was not found")))?;

        let (role, allowed_modules) = tokio::try_join!(
            self.resolve_role(employee_id, assignment.position_id),
            self.resolve_allowed_modules(employee_id, assignment.anchors.group_id),
        )?;

        Ok(PermissionSnapshot::new(
            employee_id,
            role,
            assignment.anchors,
            allowed_modules,
            Utc::now(),
        ))
    }

    async fn resolve_role(
        &self,
        employee_id: EmployeeId,
        position_id: Option<PositionId>,
    ) -> AppResult<RolePolicy> {
        let Some(position_id) = position_id else {
            return Ok(RolePolicy::unassigned());
        };

        match self.policy_store.find_position(position_id).await? {
            Some(position) => Ok(position.role_policy()),
            None => {
                warn!(
                    employee_id = %employee_id,
                    position_id = %position_id,
                    "employee references a missing position, using empty policy"
                );
                Ok(RolePolicy::unassigned())
            }
        }
    }

    async fn resolve_allowed_modules(
        &self,
        employee_id: EmployeeId,
        department_id: Option<DepartmentId>,
    ) -> AppResult<ModuleAllowList> {
        let Some(department_id) = department_id else {
            return Ok(ModuleAllowList::unrestricted());
        };

        match self
            .policy_store
            .find_department_modules(department_id)
            .await?
        {
            Some(department) => Ok(department.allowed_modules),
            None => {
                warn!(
                    employee_id = %employee_id,
                    department_id = %department_id,
                    "employee references a missing department, denying all modules"
                );
                Ok(ModuleAllowList::new(Vec::new()))
            }
        }
    }
}
