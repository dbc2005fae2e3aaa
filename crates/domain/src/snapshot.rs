use backoffice_core::{DepartmentId, EmployeeId, PositionId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DataScope, Grants, ModuleAllowList};

/// Position policy captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    /// Position the policy was read from; `None` for unassigned employees.
    pub position_id: Option<PositionId>,
    /// Module grants.
    pub grants: Grants,
    /// Row-visibility tier.
    pub data_scope: DataScope,
    /// Whether holders may approve subordinates' requests.
    pub can_manage_subordinates: bool,
}

impl RolePolicy {
    /// Policy of an employee without a position: nothing granted, own rows only.
    #[must_use]
    pub fn unassigned() -> Self {
        Self {
            position_id: None,
            grants: Grants::new(),
            data_scope: DataScope::SelfOnly,
            can_manage_subordinates: false,
        }
    }
}

/// Project and department anchors used for data-scope comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeAnchors {
    /// Assigned project.
    pub project_id: Option<ProjectId>,
    /// Assigned department.
    pub group_id: Option<DepartmentId>,
}

/// Scope anchors of an arbitrary employee, used as a comparison target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmployeeScope {
    /// Employee the anchors belong to.
    pub employee_id: EmployeeId,
    /// Anchors of that employee.
    pub anchors: ScopeAnchors,
}

/// Immutable materialization of one employee's effective policy inputs.
///
/// A policy change always produces a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    employee_id: EmployeeId,
    role: RolePolicy,
    scope_anchors: ScopeAnchors,
    allowed_modules: ModuleAllowList,
    built_at: DateTime<Utc>,
}

impl PermissionSnapshot {
    /// Assembles a snapshot from already-resolved policy inputs.
    #[must_use]
    pub fn new(
        employee_id: EmployeeId,
        role: RolePolicy,
        scope_anchors: ScopeAnchors,
        allowed_modules: ModuleAllowList,
        built_at: DateTime<Utc>,
    ) -> Self {
        Self {
            employee_id,
            role,
            scope_anchors,
            allowed_modules,
            built_at,
        }
    }

    /// Returns the employee the snapshot was built for.
    #[must_use]
    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    /// Returns the position policy.
    #[must_use]
    pub fn role(&self) -> &RolePolicy {
        &self.role
    }

    /// Returns the employee's own anchors.
    #[must_use]
    pub fn scope_anchors(&self) -> ScopeAnchors {
        self.scope_anchors
    }

    /// Returns the employee's own anchors as a comparison target.
    #[must_use]
    pub fn employee_scope(&self) -> EmployeeScope {
        EmployeeScope {
            employee_id: self.employee_id,
            anchors: self.scope_anchors,
        }
    }

    /// Returns the department module allow-list.
    #[must_use]
    pub fn allowed_modules(&self) -> &ModuleAllowList {
        &self.allowed_modules
    }

    /// Returns when the snapshot was read from the policy store.
    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
