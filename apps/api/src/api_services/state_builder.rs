use std::sync::Arc;

use backoffice_application::{
    DataScopeFilterCompiler, PermissionAuditService, PermissionInvalidationService,
    PermissionService, PolicyAdminService, SessionPermissionCache, SessionPermissionCacheStore,
};
use backoffice_core::AppError;
use backoffice_infrastructure::{
    InMemorySessionPermissionCache, PostgresEmployeeDirectory, PostgresPermissionAuditRepository,
    PostgresPolicyStore, PostgresSessionRepository, RedisSessionPermissionCache,
};
use sqlx::PgPool;
use tracing::info;

use crate::api_config::{ApiConfig, PermissionCacheBackend};
use crate::state::AppState;

use super::build_redis_client;

pub fn build_app_state(pool: PgPool, config: &ApiConfig) -> Result<AppState, AppError> {
    let policy_store = Arc::new(PostgresPolicyStore::new(pool.clone()));
    let sessions = Arc::new(PostgresSessionRepository::new(pool.clone()));
    let cache = SessionPermissionCache::new(build_cache_store(&config.permission_cache_backend)?)
        .with_default_ttl_seconds(config.permission_cache_default_ttl_seconds);

    let invalidation_service =
        PermissionInvalidationService::new(sessions.clone(), policy_store.clone(), cache.clone())
            .with_max_concurrency(config.fan_out_concurrency);
    let audit_service = PermissionAuditService::new(
        Arc::new(PostgresPermissionAuditRepository::new(pool.clone())),
        policy_store.clone(),
    );
    let policy_admin_service =
        PolicyAdminService::new(policy_store.clone(), audit_service, invalidation_service);
    let permission_service = PermissionService::new(
        sessions,
        policy_store,
        cache,
        DataScopeFilterCompiler::new(config.data_scope_strict),
    );

    Ok(AppState {
        permission_service,
        policy_admin_service,
        employee_directory: Arc::new(PostgresEmployeeDirectory::new(pool.clone())),
        postgres_pool: pool,
    })
}

fn build_cache_store(
    backend: &PermissionCacheBackend,
) -> Result<Arc<dyn SessionPermissionCacheStore>, AppError> {
    match backend {
        PermissionCacheBackend::Redis {
            redis_url,
            key_prefix,
        } => {
            info!(key_prefix = %key_prefix, "using redis permission cache");
            Ok(Arc::new(RedisSessionPermissionCache::new(
                build_redis_client(redis_url)?,
                key_prefix.clone(),
            )))
        }
        PermissionCacheBackend::InMemory => {
            info!("using in-process permission cache");
            Ok(Arc::new(InMemorySessionPermissionCache::new()))
        }
    }
}
