use async_trait::async_trait;
use backoffice_core::{AppResult, DepartmentId, EmployeeId, PositionId};
use backoffice_domain::{DataScope, Grants, ModuleAllowList, RolePolicy, ScopeAnchors};
use serde::Serialize;

/// Position definition as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionRecord {
    /// Stable position identifier.
    pub position_id: PositionId,
    /// Human-readable position name.
    pub name: String,
    /// Whether holders may approve subordinates' requests.
    pub can_manage_subordinates: bool,
    /// Row-visibility tier.
    pub data_scope: DataScope,
    /// Module grants.
    pub permissions: Grants,
}

impl PositionRecord {
    /// Projects the record into the policy carried by snapshots.
    #[must_use]
    pub fn role_policy(&self) -> RolePolicy {
        RolePolicy {
            position_id: Some(self.position_id),
            grants: self.permissions.clone(),
            data_scope: self.data_scope,
            can_manage_subordinates: self.can_manage_subordinates,
        }
    }
}

/// Employee position and scope-anchor assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeAssignment {
    /// Employee identifier.
    pub employee_id: EmployeeId,
    /// Display name used in audit records.
    pub display_name: String,
    /// Assigned position, if any.
    pub position_id: Option<PositionId>,
    /// Assigned project and department.
    pub anchors: ScopeAnchors,
}

/// Department module allow-list as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentModules {
    /// Department identifier.
    pub department_id: DepartmentId,
    /// Allowed module patterns.
    pub allowed_modules: ModuleAllowList,
}

/// Committed before/after pair returned by policy mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyChange<T> {
    /// State read inside the mutating transaction before the write.
    pub before: T,
    /// State after the committed write.
    pub after: T,
}

/// Input payload for position creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePositionInput {
    /// Unique position name.
    pub name: String,
    /// Whether holders may approve subordinates' requests.
    pub can_manage_subordinates: bool,
    /// Row-visibility tier.
    pub data_scope: DataScope,
    /// Module grants.
    pub permissions: Grants,
}

/// Input payload replacing a position's policy fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPermissionsInput {
    /// Whether holders may approve subordinates' requests.
    pub can_manage_subordinates: bool,
    /// Row-visibility tier.
    pub data_scope: DataScope,
    /// Module grants.
    pub permissions: Grants,
}

/// Input payload replacing an employee's assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeAssignmentInput {
    /// New position, or `None` to unassign.
    pub position_id: Option<PositionId>,
    /// New project and department anchors.
    pub anchors: ScopeAnchors,
}

/// Durable source of truth for positions, assignments and department modules.
///
/// Mutations return only after their transaction has committed.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Finds a position by id.
    async fn find_position(&self, position_id: PositionId) -> AppResult<Option<PositionRecord>>;

    /// Finds one employee's assignment.
    async fn find_employee_assignment(
        &self,
        employee_id: EmployeeId,
    ) -> AppResult<Option<EmployeeAssignment>>;

    /// Finds a department's module allow-list.
    async fn find_department_modules(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Option<DepartmentModules>>;

    /// Lists employees currently holding a position.
    async fn list_employees_by_position(
        &self,
        position_id: PositionId,
    ) -> AppResult<Vec<EmployeeId>>;

    /// Lists employees currently assigned to a department.
    async fn list_employees_by_department(
        &self,
        department_id: DepartmentId,
    ) -> AppResult<Vec<EmployeeId>>;

    /// Creates a position.
    async fn create_position(&self, input: CreatePositionInput) -> AppResult<PositionRecord>;

    /// Replaces a position's grants, data scope and manage flag.
    async fn update_position_permissions(
        &self,
        position_id: PositionId,
        input: PositionPermissionsInput,
    ) -> AppResult<PolicyChange<PositionRecord>>;

    /// Replaces an employee's position and scope anchors.
    async fn update_employee_assignment(
        &self,
        employee_id: EmployeeId,
        input: EmployeeAssignmentInput,
    ) -> AppResult<PolicyChange<EmployeeAssignment>>;

    /// Replaces a department's module allow-list.
    async fn update_department_modules(
        &self,
        department_id: DepartmentId,
        allowed_modules: ModuleAllowList,
    ) -> AppResult<PolicyChange<DepartmentModules>>;
}
