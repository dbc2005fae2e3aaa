use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use backoffice_core::{AppError, SessionId};

use crate::error::ApiResult;
use crate::state::AppState;

/// Resolves the bearer session into a permission context extension.
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let session_id = bearer_session_id(request.headers().get(header::AUTHORIZATION))?;
    let context = state
        .permission_service
        .context_for_session(&session_id)
        .await?;

    request.extensions_mut().insert(session_id);
    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn bearer_session_id(value: Option<&header::HeaderValue>) -> Result<SessionId, AppError> {
    let value = value
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("authentication required".to_owned()))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .ok_or_else(|| AppError::Unauthorized("bearer session token required".to_owned()))?;

    SessionId::new(token)
        .map_err(|_| AppError::Unauthorized("malformed session token".to_owned()))
}
