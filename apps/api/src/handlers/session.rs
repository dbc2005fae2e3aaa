use axum::extract::{Extension, State};
use axum::http::StatusCode;
use backoffice_core::SessionId;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn close_session_handler(
    State(state): State<AppState>,
    Extension(session_id): Extension<SessionId>,
) -> ApiResult<StatusCode> {
    state.permission_service.close_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
