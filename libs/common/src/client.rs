//! HTTP client for the notification bridge, used by the stateless backend.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::bridge::{
    paths, BridgeResponse, PingRequest, PongResponse, SseAdminEvent, SseUserEvent,
    WsAdminEvent, WsBroadcastEvent, WsUserEvent, ADMIN_KEY_HEADER,
};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bridge rejected the call with status {0}")]
    Status(reqwest::StatusCode),
    #[error("bridge reported failure: {0}")]
    Remote(String),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("pong sequence mismatch (sent {sent}, received {received})")]
    PingMismatch { sent: i64, received: i64 },
}

/// Cloneable handle to a realtime bridge. Cheap to clone; share one per process.
#[derive(Clone)]
pub struct NotificationClient {
    base_url: String,
    admin_key: String,
    http: reqwest::Client,
    sequence: Arc<AtomicI64>,
}

impl NotificationClient {
    pub fn new(base_url: &str, admin_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_key: admin_key.to_string(),
            http: reqwest::Client::new(),
            sequence: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Build a client and confirm the bridge answers a ping before returning it.
    pub async fn connect(base_url: &str, admin_key: &str) -> Result<Self, BridgeError> {
        let client = Self::new(base_url, admin_key);
        let pong = client.ping("startup").await?;
        tracing::info!(url = %client.base_url, sequence = pong.sequence, "realtime bridge reachable");
        Ok(client)
    }

    pub async fn send_sse_to_admin(
        &self,
        resource: &str,
        resource_type: &str,
        data: &Map<String, Value>,
    ) -> Result<(), BridgeError> {
        let req = SseAdminEvent {
            resource: resource.to_string(),
            resource_type: resource_type.to_string(),
            data_json: serde_json::to_string(data)?,
        };
        self.send(paths::SEND_SSE_TO_ADMIN, &req).await
    }

    pub async fn send_sse_to_user(
        &self,
        user_id: &str,
        resource: &str,
        resource_type: &str,
        data: &Map<String, Value>,
    ) -> Result<(), BridgeError> {
        let req = SseUserEvent {
            user_id: user_id.to_string(),
            resource: resource.to_string(),
            resource_type: resource_type.to_string(),
            data_json: serde_json::to_string(data)?,
        };
        self.send(paths::SEND_SSE_TO_USER, &req).await
    }

    pub async fn send_ws_to_admin(&self, kind: &str, data: &Value) -> Result<(), BridgeError> {
        let req = WsAdminEvent {
            kind: kind.to_string(),
            data_json: serde_json::to_string(data)?,
        };
        self.send(paths::SEND_WS_TO_ADMIN, &req).await
    }

    pub async fn send_ws_to_user(
        &self,
        user_id: &str,
        kind: &str,
        data: &Value,
    ) -> Result<(), BridgeError> {
        let req = WsUserEvent {
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            data_json: serde_json::to_string(data)?,
        };
        self.send(paths::SEND_WS_TO_USER, &req).await
    }

    pub async fn broadcast_ws(&self, kind: &str, data: &Value) -> Result<(), BridgeError> {
        let req = WsBroadcastEvent {
            kind: kind.to_string(),
            data_json: serde_json::to_string(data)?,
        };
        self.send(paths::BROADCAST_WS, &req).await
    }

    /// Health check. Fails unless the bridge echoes our sequence number.
    pub async fn ping(&self, message: &str) -> Result<PongResponse, BridgeError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let req = PingRequest {
            sequence,
            message: message.to_string(),
        };
        let pong: PongResponse = self.call(paths::PING, &req).await?;
        check_pong(sequence, pong)
    }

    async fn send<Req: Serialize>(&self, path: &str, req: &Req) -> Result<(), BridgeError> {
        let resp: BridgeResponse = self.call(path, req).await?;
        if resp.success {
            Ok(())
        } else {
            Err(BridgeError::Remote(resp.error.unwrap_or_default()))
        }
    }

    async fn call<Req, Resp>(&self, path: &str, req: &Req) -> Result<Resp, BridgeError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(ADMIN_KEY_HEADER, &self.admin_key)
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BridgeError::Status(status));
        }

        Ok(resp.json().await?)
    }
}

fn check_pong(sent: i64, pong: PongResponse) -> Result<PongResponse, BridgeError> {
    if !pong.success {
        return Err(BridgeError::Remote(format!(
            "ping {sent} answered with success=false"
        )));
    }
    if pong.sequence != sent {
        return Err(BridgeError::PingMismatch {
            sent,
            received: pong.sequence,
        });
    }
    Ok(pong)
}
