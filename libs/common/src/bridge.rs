//! Request/response contract of the notification bridge.
//!
//! The realtime process serves these as `POST <path>` JSON calls on its bridge
//! listener; [`crate::NotificationClient`] is the calling side. Payload data
//! travels as an opaque JSON string so the bridge stays schema-agnostic.

use serde::{Deserialize, Serialize};

/// Metadata header carrying the shared admin credential on every bridge call.
pub const ADMIN_KEY_HEADER: &str = "x-admin-api-key";

/// Route of each bridge operation.
pub mod paths {
    pub const SEND_SSE_TO_ADMIN: &str = "/rpc/SendSSEToAdmin";
    pub const SEND_SSE_TO_USER: &str = "/rpc/SendSSEToUser";
    pub const SEND_WS_TO_ADMIN: &str = "/rpc/SendWebSocketToAdmin";
    pub const SEND_WS_TO_USER: &str = "/rpc/SendWebSocketToUser";
    pub const BROADCAST_WS: &str = "/rpc/BroadcastWebSocket";
    pub const PING: &str = "/rpc/Ping";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseAdminEvent {
    pub resource: String,
    pub resource_type: String,
    /// JSON object, encoded as a string.
    pub data_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseUserEvent {
    pub user_id: String,
    pub resource: String,
    pub resource_type: String,
    /// JSON object, encoded as a string.
    pub data_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsAdminEvent {
    #[serde(rename = "type")]
    pub kind: String,
    /// Any JSON value, encoded as a string.
    pub data_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsUserEvent {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data_json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsBroadcastEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data_json: String,
}

/// Result of every send operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingRequest {
    pub sequence: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongResponse {
    pub message: String,
    pub sequence: i64,
    pub success: bool,
}
