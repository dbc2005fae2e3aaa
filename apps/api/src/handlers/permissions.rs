use axum::Json;
use axum::extract::Extension;
use backoffice_domain::PermissionContext;

use crate::dto::PermissionsResponse;

pub async fn my_permissions_handler(
    Extension(context): Extension<PermissionContext>,
) -> Json<PermissionsResponse> {
    Json(PermissionsResponse::from(&context))
}
