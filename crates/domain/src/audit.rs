use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use backoffice_core::AppError;
use serde::{Deserialize, Serialize};

use crate::{ActionId, Grants, ModuleId, SubModuleId};

/// Policy entity touched by an audited mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntityType {
    /// A position and its grants.
    Position,
    /// An employee's position/project/department assignment.
    Employee,
    /// A department module allow-list.
    Department,
}

impl AuditEntityType {
    /// Returns a stable storage value for this entity type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Employee => "employee",
            Self::Department => "department",
        }
    }
}

impl FromStr for AuditEntityType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "position" => Ok(Self::Position),
            "employee" => Ok(Self::Employee),
            "department" => Ok(Self::Department),
            _ => Err(AppError::Validation(format!(
                "unknown audit entity type '{value}'"
            ))),
        }
    }
}

/// Stable audit actions emitted by policy mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionAuditAction {
    /// A position was created.
    PositionCreated,
    /// A position's grants, data scope or manage flag changed.
    PositionPermissionsUpdated,
    /// An employee's position or scope anchors changed.
    EmployeeReassigned,
    /// A department's module allow-list changed.
    DepartmentModulesUpdated,
}

impl PermissionAuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PositionCreated => "policy.position.created",
            Self::PositionPermissionsUpdated => "policy.position.permissions_updated",
            Self::EmployeeReassigned => "policy.employee.reassigned",
            Self::DepartmentModulesUpdated => "policy.department.modules_updated",
        }
    }
}

impl FromStr for PermissionAuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "policy.position.created" => Ok(Self::PositionCreated),
            "policy.position.permissions_updated" => Ok(Self::PositionPermissionsUpdated),
            "policy.employee.reassigned" => Ok(Self::EmployeeReassigned),
            "policy.department.modules_updated" => Ok(Self::DepartmentModulesUpdated),
            _ => Err(AppError::Validation(format!(
                "unknown permission audit action '{value}'"
            ))),
        }
    }
}

/// Added and removed actions of one sub-module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDiff {
    /// Actions present only after the change.
    pub added: BTreeSet<ActionId>,
    /// Actions present only before the change.
    pub removed: BTreeSet<ActionId>,
}

/// Human-oriented difference between two grant tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDiff {
    /// Modules granted only after the change.
    pub added_modules: BTreeSet<ModuleId>,
    /// Modules granted only before the change.
    pub removed_modules: BTreeSet<ModuleId>,
    /// Per-sub-module action changes for modules granted on both sides.
    pub changed_modules: BTreeMap<ModuleId, BTreeMap<SubModuleId, ActionDiff>>,
}

impl PermissionDiff {
    /// Returns whether the two grant tables were identical.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_modules.is_empty()
            && self.removed_modules.is_empty()
            && self.changed_modules.is_empty()
    }

    /// Renders a one-line summary such as `+hr; -assets; finance.flow +approve -edit`.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no permission changes".to_owned();
        }

        let mut parts = Vec::new();
        parts.extend(self.added_modules.iter().map(|module| format!("+{module}")));
        parts.extend(self.removed_modules.iter().map(|module| format!("-{module}")));

        for (module, sub_modules) in &self.changed_modules {
            for (sub_module, actions) in sub_modules {
                let mut changes = Vec::new();
                changes.extend(actions.added.iter().map(|action| format!("+{action}")));
                changes.extend(actions.removed.iter().map(|action| format!("-{action}")));
                parts.push(format!("{module}.{sub_module} {}", changes.join(" ")));
            }
        }

        parts.join("; ")
    }
}

/// Computes added/removed modules and per-sub-module action changes.
#[must_use]
pub fn diff_permissions(before: &Grants, after: &Grants) -> PermissionDiff {
    let mut diff = PermissionDiff::default();
    let empty = BTreeSet::new();

    for (module, after_sub_modules) in after.iter() {
        let Some(before_sub_modules) = before.module(module.as_str()) else {
            diff.added_modules.insert(module.clone());
            continue;
        };

        let sub_module_names: BTreeSet<&SubModuleId> = before_sub_modules
            .keys()
            .chain(after_sub_modules.keys())
            .collect();

        let mut changed = BTreeMap::new();
        for sub_module in sub_module_names {
            let before_actions = before_sub_modules.get(sub_module).unwrap_or(&empty);
            let after_actions = after_sub_modules.get(sub_module).unwrap_or(&empty);
            let action_diff = ActionDiff {
                added: after_actions.difference(before_actions).cloned().collect(),
                removed: before_actions.difference(after_actions).cloned().collect(),
            };

            if !action_diff.added.is_empty() || !action_diff.removed.is_empty() {
                changed.insert(sub_module.clone(), action_diff);
            }
        }

        if !changed.is_empty() {
            diff.changed_modules.insert(module.clone(), changed);
        }
    }

    diff.removed_modules = before
        .modules()
        .filter(|module| after.module(module.as_str()).is_none())
        .cloned()
        .collect();

    diff
}
