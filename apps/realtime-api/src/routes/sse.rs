//! Server-sent event streams for the admin dashboard and for signed-in users.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::Stream;

use crate::auth::middleware::{AdminKey, AuthUser};
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::SseSubscription;
use crate::AppState;

/// Name of the SSE event every hub message is sent under.
pub const EVENT_NAME: &str = "message";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/sse", get(admin_stream))
        .route("/user/sse/notification/{user_id}", get(user_stream))
}

/// Stream of admin events.
#[utoipa::path(
    get,
    path = "/api/admin/sse",
    tag = "SSE",
    params(
        ("admin_key" = Option<String>, Query, description = "Admin API key, if not sent as a header"),
    ),
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid admin key", body = ApiErrorBody),
    )
)]
pub async fn admin_stream(
    _admin: AdminKey,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.sse.register_admin();
    Sse::new(events(subscription)).keep_alive(KeepAlive::default())
}

/// Stream of events for one user. The token must belong to that user.
#[utoipa::path(
    get,
    path = "/api/user/sse/notification/{user_id}",
    tag = "SSE",
    params(
        ("user_id" = String, Path, description = "User to subscribe to"),
        ("token" = Option<String>, Query, description = "Access token, if not sent as a bearer header"),
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Event stream", content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid token", body = ApiErrorBody),
        (status = 403, description = "Token belongs to another user", body = ApiErrorBody),
    )
)]
pub async fn user_stream(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if user.user_id != user_id {
        tracing::warn!(token_user = %user.user_id, %user_id, "sse subscription for another user");
        return Err(ApiError::forbidden("access denied"));
    }

    let subscription = state.sse.register_user(&user_id);
    Ok(Sse::new(events(subscription)).keep_alive(KeepAlive::default()))
}

/// Turn a subscription into an event stream. The stream, and with it the
/// subscription, is dropped when the client goes away.
fn events(subscription: SseSubscription) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(subscription, |mut subscription| async move {
        let payload = subscription.recv().await?;
        let event = Event::default().event(EVENT_NAME).data(&*payload);
        Some((Ok(event), subscription))
    })
}
