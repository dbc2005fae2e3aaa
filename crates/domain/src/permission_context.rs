use std::sync::Arc;

use crate::{
    DataScope, EmployeeScope, ModuleId, PermissionLogic, PermissionRequirement,
    PermissionSnapshot, ScopeAnchors,
};

/// Side-effect-free policy evaluator over one snapshot.
///
/// Every question is answered from the snapshot plus caller-provided target
/// anchors; a `false` answer is a denial, never an error.
#[derive(Debug, Clone)]
pub struct PermissionContext {
    snapshot: Arc<PermissionSnapshot>,
}

impl PermissionContext {
    /// Creates an evaluator over a snapshot.
    #[must_use]
    pub fn new(snapshot: PermissionSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    /// Creates an evaluator sharing an existing snapshot.
    #[must_use]
    pub fn from_shared(snapshot: Arc<PermissionSnapshot>) -> Self {
        Self { snapshot }
    }

    /// Returns the snapshot under evaluation.
    #[must_use]
    pub fn snapshot(&self) -> &PermissionSnapshot {
        self.snapshot.as_ref()
    }

    /// Returns the acting employee's data scope.
    #[must_use]
    pub fn data_scope(&self) -> DataScope {
        self.snapshot.role().data_scope
    }

    /// Returns whether the department allow-list lets the actor use a module.
    ///
    /// Positions with `all` data scope are exempt from department restriction.
    #[must_use]
    pub fn is_module_allowed(&self, module: &str) -> bool {
        if self.data_scope() == DataScope::All {
            return true;
        }

        self.snapshot.allowed_modules().allows(module)
    }

    /// Checks a grant at module, sub-module or action granularity.
    ///
    /// `action` is only considered together with `sub_module`.
    #[must_use]
    pub fn has_permission(
        &self,
        module: &str,
        sub_module: Option<&str>,
        action: Option<&str>,
    ) -> bool {
        if !self.is_module_allowed(module) {
            return false;
        }

        let grants = &self.snapshot.role().grants;
        let Some(sub_modules) = grants.module(module) else {
            return false;
        };

        let Some(sub_module) = sub_module else {
            return sub_modules.values().any(|actions| !actions.is_empty());
        };

        let Some(actions) = sub_modules.get(sub_module) else {
            return false;
        };

        match action {
            None => !actions.is_empty(),
            Some(action) => actions.contains(action),
        }
    }

    /// Evaluates one requirement.
    #[must_use]
    pub fn satisfies(&self, requirement: &PermissionRequirement) -> bool {
        self.has_permission(
            requirement.module.as_str(),
            requirement.sub_module.as_deref(),
            requirement.action.as_deref(),
        )
    }

    /// Evaluates a batch of requirements.
    #[must_use]
    pub fn check_permissions(
        &self,
        requirements: &[PermissionRequirement],
        logic: PermissionLogic,
    ) -> bool {
        match logic {
            PermissionLogic::And => requirements.iter().all(|value| self.satisfies(value)),
            PermissionLogic::Or => requirements.iter().any(|value| self.satisfies(value)),
        }
    }

    /// Returns whether the actor may see or mutate data owned by `target`.
    #[must_use]
    pub fn can_access_data(&self, target: &EmployeeScope) -> bool {
        let scope = self.data_scope();
        if scope == DataScope::All || target.employee_id == self.snapshot.employee_id() {
            return true;
        }

        anchors_share_scope(scope, self.snapshot.scope_anchors(), target.anchors)
    }

    /// Returns whether the actor may approve a request filed by `applicant`.
    ///
    /// Requires the manage-subordinates flag and never allows self-approval.
    #[must_use]
    pub fn can_approve(&self, applicant: &EmployeeScope) -> bool {
        let role = self.snapshot.role();
        if !role.can_manage_subordinates || applicant.employee_id == self.snapshot.employee_id() {
            return false;
        }

        match role.data_scope {
            DataScope::All => true,
            scope => anchors_share_scope(scope, self.snapshot.scope_anchors(), applicant.anchors),
        }
    }

    /// Lists granted modules that also pass the department allow-list.
    #[must_use]
    pub fn accessible_modules(&self) -> Vec<&ModuleId> {
        self.snapshot
            .role()
            .grants
            .modules()
            .filter(|module| self.has_permission(module.as_str(), None, None))
            .collect()
    }
}

fn anchors_share_scope(scope: DataScope, actor: ScopeAnchors, target: ScopeAnchors) -> bool {
    match scope {
        DataScope::All => true,
        DataScope::Project => matches!(
            (actor.project_id, target.project_id),
            (Some(actor_project), Some(target_project)) if actor_project == target_project
        ),
        DataScope::Group => matches!(
            (actor.group_id, target.group_id),
            (Some(actor_group), Some(target_group)) if actor_group == target_group
        ),
        DataScope::SelfOnly => false,
    }
}

#[cfg(test)]
mod tests;
