//! Policy model: grants, data scopes, snapshots and the pure evaluators over them.

#![forbid(unsafe_code)]

mod audit;
mod data_scope_filter;
mod module_access;
mod permission;
mod permission_context;
mod snapshot;

pub use audit::{
    ActionDiff, AuditEntityType, PermissionAuditAction, PermissionDiff, diff_permissions,
};
pub use data_scope_filter::{
    ColumnName, DataScopeColumns, DataScopePredicate, RowScope, ScopeValue,
    compile_data_scope_filter,
};
pub use module_access::{ModuleAllowList, ModulePattern};
pub use permission::{
    ActionId, DataScope, Grants, ModuleId, PermissionLogic, PermissionRequirement, SubModuleId,
};
pub use permission_context::PermissionContext;
pub use snapshot::{EmployeeScope, PermissionSnapshot, RolePolicy, ScopeAnchors};
