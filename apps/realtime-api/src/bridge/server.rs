use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{middleware, Json, Router};
use realtime_common::bridge::{
    paths, BridgeResponse, PingRequest, PongResponse, SseAdminEvent, SseUserEvent,
    WsAdminEvent, WsBroadcastEvent, WsUserEvent,
};
use realtime_common::{SseMessage, WsMessage};
use serde_json::{Map, Value};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::hub::HubError;
use crate::AppState;

use super::interceptor::require_admin_key;

/// Router served on the bridge listener. The admin key check wraps every
/// route and the fallback.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(paths::SEND_SSE_TO_ADMIN, post(send_sse_to_admin))
        .route(paths::SEND_SSE_TO_USER, post(send_sse_to_user))
        .route(paths::SEND_WS_TO_ADMIN, post(send_ws_to_admin))
        .route(paths::SEND_WS_TO_USER, post(send_ws_to_user))
        .route(paths::BROADCAST_WS, post(broadcast_ws))
        .route(paths::PING, post(ping))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin_key))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type BridgeResult = Result<Json<BridgeResponse>, ApiError>;

fn decode<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(req)| req)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

/// SSE data must be a JSON object; `null` is read as an empty one.
fn sse_data(data_json: &str) -> Result<Map<String, Value>, String> {
    serde_json::from_str::<Option<Map<String, Value>>>(data_json)
        .map(Option::unwrap_or_default)
        .map_err(|err| err.to_string())
}

fn ws_data(data_json: &str) -> Result<Value, String> {
    serde_json::from_str(data_json).map_err(|err| err.to_string())
}

/// Map a hub outcome onto the bridge response.
fn respond(op: &str, outcome: Result<(), HubError>) -> Json<BridgeResponse> {
    match outcome {
        Ok(()) => Json(BridgeResponse::ok()),
        Err(err) => {
            tracing::error!(op, %err, "bridge delivery failed");
            Json(BridgeResponse::failure(err.to_string()))
        }
    }
}

fn rejected(op: &str, error: String) -> Json<BridgeResponse> {
    tracing::warn!(op, %error, "bridge payload rejected");
    Json(BridgeResponse::failure(error))
}

async fn send_sse_to_admin(
    State(state): State<AppState>,
    body: Result<Json<SseAdminEvent>, JsonRejection>,
) -> BridgeResult {
    let req = decode(body)?;
    let data = match sse_data(&req.data_json) {
        Ok(data) => data,
        Err(error) => return Ok(rejected("SendSSEToAdmin", error)),
    };

    let msg = SseMessage::new(req.resource, req.resource_type, data);
    Ok(respond(
        "SendSSEToAdmin",
        state.sse.broadcast_to_admin(&msg).map(drop),
    ))
}

async fn send_sse_to_user(
    State(state): State<AppState>,
    body: Result<Json<SseUserEvent>, JsonRejection>,
) -> BridgeResult {
    let req = decode(body)?;
    let data = match sse_data(&req.data_json) {
        Ok(data) => data,
        Err(error) => return Ok(rejected("SendSSEToUser", error)),
    };

    let msg = SseMessage::new(req.resource, req.resource_type, data);
    Ok(respond(
        "SendSSEToUser",
        state.sse.broadcast_to_user(&req.user_id, &msg).map(drop),
    ))
}

async fn send_ws_to_admin(
    State(state): State<AppState>,
    body: Result<Json<WsAdminEvent>, JsonRejection>,
) -> BridgeResult {
    let req = decode(body)?;
    let data = match ws_data(&req.data_json) {
        Ok(data) => data,
        Err(error) => return Ok(rejected("SendWebSocketToAdmin", error)),
    };

    let msg = WsMessage::new(req.kind, data);
    Ok(respond("SendWebSocketToAdmin", state.ws.send_to_admin(&msg)))
}

async fn send_ws_to_user(
    State(state): State<AppState>,
    body: Result<Json<WsUserEvent>, JsonRejection>,
) -> BridgeResult {
    let req = decode(body)?;
    let data = match ws_data(&req.data_json) {
        Ok(data) => data,
        Err(error) => return Ok(rejected("SendWebSocketToUser", error)),
    };

    let msg = WsMessage::new(req.kind, data).with_to(req.user_id.clone());
    Ok(respond(
        "SendWebSocketToUser",
        state.ws.send_to_user(&req.user_id, &msg),
    ))
}

async fn broadcast_ws(
    State(state): State<AppState>,
    body: Result<Json<WsBroadcastEvent>, JsonRejection>,
) -> BridgeResult {
    let req = decode(body)?;
    let data = match ws_data(&req.data_json) {
        Ok(data) => data,
        Err(error) => return Ok(rejected("BroadcastWebSocket", error)),
    };

    let msg = WsMessage::new(req.kind, data);
    Ok(respond("BroadcastWebSocket", state.ws.broadcast(&msg)))
}

async fn ping(body: Result<Json<PingRequest>, JsonRejection>) -> Result<Json<PongResponse>, ApiError> {
    let req = decode(body)?;
    tracing::info!(sequence = req.sequence, message = %req.message, "bridge ping");

    Ok(Json(PongResponse {
        message: "pong".to_string(),
        sequence: req.sequence,
        success: true,
    }))
}
