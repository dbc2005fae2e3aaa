use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use backoffice_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route(
            "/api/permissions/me",
            get(handlers::permissions::my_permissions_handler),
        )
        .route(
            "/api/session",
            delete(handlers::session::close_session_handler),
        )
        .route("/api/employees", get(handlers::employees::list_employees_handler))
        .route(
            "/api/positions",
            post(handlers::positions::create_position_handler),
        )
        .route(
            "/api/positions/{position_id}/permissions",
            put(handlers::positions::update_position_permissions_handler),
        )
        .route(
            "/api/employees/{employee_id}/assignment",
            put(handlers::positions::reassign_employee_handler),
        )
        .route(
            "/api/departments/{department_id}/modules",
            put(handlers::positions::update_department_modules_handler),
        )
        .route(
            "/api/audit/permissions",
            get(handlers::audit::list_permission_audit_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_session,
        ));

    let cors_layer = cors::build_cors_layer(frontend_url)?;

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(app_state))
}
