mod audit;
mod cache;
mod directory;
mod sessions;
mod store;

pub use audit::{
    NewPermissionAuditRecord, PermissionAuditQuery, PermissionAuditRecord,
    PermissionAuditRepository,
};
pub use cache::{SessionCacheEntry, SessionPermissionCacheStore};
pub use directory::EmployeeDirectory;
pub use sessions::{ActiveSession, SessionRepository};
pub use store::{
    CreatePositionInput, DepartmentModules, EmployeeAssignment, EmployeeAssignmentInput,
    PolicyChange, PolicyStore, PositionPermissionsInput, PositionRecord,
};
