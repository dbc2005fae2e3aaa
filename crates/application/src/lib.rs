//! Application services and ports.

#![forbid(unsafe_code)]

mod data_scope_filter_compiler;
mod invalidation_service;
mod permission_audit_service;
mod permission_service;
mod policy_admin_service;
mod policy_ports;
mod session_permission_cache;
mod snapshot_builder;

#[cfg(test)]
mod test_support;

pub use data_scope_filter_compiler::DataScopeFilterCompiler;
pub use invalidation_service::{
    DEFAULT_FAN_OUT_CONCURRENCY, InvalidationReport, PermissionInvalidationService,
};
pub use permission_audit_service::{
    MAX_AUDIT_PAGE_SIZE, PermissionAuditService, PermissionChangeInput,
};
pub use permission_service::PermissionService;
pub use policy_admin_service::{PolicyAdminService, PolicyUpdate};
pub use policy_ports::{
    ActiveSession, CreatePositionInput, DepartmentModules, EmployeeAssignment,
    EmployeeAssignmentInput, EmployeeDirectory, NewPermissionAuditRecord, PermissionAuditQuery,
    PermissionAuditRecord, PermissionAuditRepository, PolicyChange, PolicyStore,
    PositionPermissionsInput, PositionRecord, SessionCacheEntry, SessionPermissionCacheStore,
    SessionRepository,
};
pub use session_permission_cache::{
    CacheLookup, DEFAULT_PERMISSION_CACHE_TTL_SECONDS, SessionPermissionCache,
};
pub use snapshot_builder::PermissionSnapshotBuilder;
