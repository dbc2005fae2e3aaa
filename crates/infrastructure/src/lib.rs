//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod data_scope_sql;
mod in_memory_session_permission_cache;
mod postgres_employee_directory;
mod postgres_permission_audit_repository;
mod postgres_policy_store;
mod postgres_session_repository;
mod redis_session_permission_cache;

pub use data_scope_sql::push_data_scope_predicate;
pub use in_memory_session_permission_cache::InMemorySessionPermissionCache;
pub use postgres_employee_directory::PostgresEmployeeDirectory;
pub use postgres_permission_audit_repository::PostgresPermissionAuditRepository;
pub use postgres_policy_store::PostgresPolicyStore;
pub use postgres_session_repository::PostgresSessionRepository;
pub use redis_session_permission_cache::RedisSessionPermissionCache;
