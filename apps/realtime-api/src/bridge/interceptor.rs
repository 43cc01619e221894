use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use realtime_common::bridge::ADMIN_KEY_HEADER;

use crate::error::ApiError;
use crate::AppState;

/// Reject any bridge call whose `x-admin-api-key` header does not match the
/// configured key. Runs in front of every route, including unknown ones.
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = state.config.admin_api_key.as_str();
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if !expected.is_empty() && key == expected => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "bridge call with invalid admin key");
            ApiError::unauthorized("Invalid admin key").into_response()
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "bridge call without admin key");
            ApiError::unauthorized("Missing admin key").into_response()
        }
    }
}
