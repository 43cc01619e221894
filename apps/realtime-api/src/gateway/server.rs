//! WebSocket upgrade handler and the admin routes that drive the WebSocket
//! hub.

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocket;
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use realtime_common::WsMessage;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use utoipa::ToSchema;

use crate::auth::middleware::{AdminKey, ConnectionIdentity};
use crate::error::{ApiError, ApiErrorBody};
use crate::hub::{ConnectionStats, Identity};
use crate::AppState;

use super::pumps::{read_pump, write_pump, MAX_MESSAGE_SIZE};

/// Envelope type used for admin-originated notifications.
pub const NOTIFICATION_TYPE: &str = "notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTarget {
    All,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotifyRequest {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub level: NotificationLevel,
    pub target: NotificationTarget,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotifyResponse {
    pub message: String,
    pub notification: NotifyRequest,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .route("/admin/ws/notify", post(notify))
        .route("/admin/ws/stats", get(stats))
}

/// Upgrade to a WebSocket.
///
/// The admin key makes an admin connection; otherwise a valid token makes an
/// identified one, and anything else connects anonymously.
#[utoipa::path(
    get,
    path = "/api/ws",
    tag = "WebSocket",
    params(
        ("token" = Option<String>, Query, description = "User access token"),
        ("admin_key" = Option<String>, Query, description = "Admin API key"),
    ),
    responses(
        (status = 101, description = "Switching protocols"),
    )
)]
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectionIdentity(identity): ConnectionIdentity,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_connection(socket, state, identity))
}

async fn handle_connection(socket: WebSocket, state: AppState, identity: Identity) {
    let (client, queue) = state.ws.new_client(identity);
    let id = client.id.clone();
    state.ws.register(client);

    let (sink, stream) = socket.split();
    let keepalive = state.config.keepalive();
    let (done_tx, done_rx) = oneshot::channel();

    let writer = tokio::spawn(write_pump(sink, queue, keepalive, done_tx));
    read_pump(stream, state.ws.clone(), id.clone(), keepalive, done_rx).await;

    if let Err(err) = writer.await {
        tracing::warn!(client_id = %id, ?err, "ws write pump panicked");
    }
}

/// Push a notification to every WebSocket client or to admins only.
#[utoipa::path(
    post,
    path = "/api/admin/ws/notify",
    tag = "WebSocket",
    request_body = NotifyRequest,
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Notification queued", body = NotifyResponse),
        (status = 400, description = "Invalid body", body = ApiErrorBody),
        (status = 401, description = "Missing or invalid admin key", body = ApiErrorBody),
    )
)]
pub async fn notify(
    _admin: AdminKey,
    State(state): State<AppState>,
    body: Result<Json<NotifyRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>, ApiError> {
    let Json(req) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::bad_request("title and message are required"));
    }

    let data = serde_json::to_value(&req).map_err(|err| {
        tracing::error!(?err, "failed to encode notification");
        ApiError::internal("Failed to encode notification")
    })?;
    let msg = WsMessage::new(NOTIFICATION_TYPE, data).with_from("admin");

    match req.target {
        NotificationTarget::All => state.ws.broadcast(&msg)?,
        NotificationTarget::Admin => state.ws.send_to_admin(&msg)?,
    }

    tracing::info!(route = ?req.target, level = ?req.level, "admin notification sent");

    Ok(Json(NotifyResponse {
        message: "Notification sent successfully".to_string(),
        notification: req,
    }))
}

/// Snapshot of the live WebSocket connections.
#[utoipa::path(
    get,
    path = "/api/admin/ws/stats",
    tag = "WebSocket",
    security(("admin_key" = [])),
    responses(
        (status = 200, description = "Connection stats", body = ConnectionStats),
        (status = 401, description = "Missing or invalid admin key", body = ApiErrorBody),
    )
)]
pub async fn stats(
    _admin: AdminKey,
    State(state): State<AppState>,
) -> Result<Json<ConnectionStats>, ApiError> {
    Ok(Json(state.ws.stats().await?))
}
