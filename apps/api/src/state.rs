use std::sync::Arc;

use backoffice_application::{EmployeeDirectory, PermissionService, PolicyAdminService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub permission_service: PermissionService,
    pub policy_admin_service: PolicyAdminService,
    pub employee_directory: Arc<dyn EmployeeDirectory>,
    pub postgres_pool: PgPool,
}
