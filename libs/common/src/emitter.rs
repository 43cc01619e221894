//! Fire-and-forget event emission for business code.
//!
//! Callers hand an [`SseMessage`] to an [`EventEmitter`] and move on; delivery
//! is best-effort and failures are logged, never returned.

use async_trait::async_trait;

use crate::client::NotificationClient;
use crate::envelope::SseMessage;

#[async_trait]
pub trait EventEmitter: Send + Sync {
    /// Push an event to every connected admin stream.
    async fn emit_admin_event(&self, event: SseMessage);

    /// Push an event to every stream opened by `user_id`.
    async fn emit_user_event(&self, user_id: &str, event: SseMessage);
}

/// Emits through a remote realtime process over the notification bridge.
#[derive(Clone)]
pub struct BridgeEmitter {
    client: NotificationClient,
}

impl BridgeEmitter {
    pub fn new(client: NotificationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventEmitter for BridgeEmitter {
    async fn emit_admin_event(&self, event: SseMessage) {
        if let Err(err) = self
            .client
            .send_sse_to_admin(&event.resource, &event.resource_type, &event.data)
            .await
        {
            tracing::warn!(
                error = %err,
                resource = %event.resource,
                resource_type = %event.resource_type,
                "failed to forward admin event to realtime bridge"
            );
        }
    }

    async fn emit_user_event(&self, user_id: &str, event: SseMessage) {
        if let Err(err) = self
            .client
            .send_sse_to_user(user_id, &event.resource, &event.resource_type, &event.data)
            .await
        {
            tracing::warn!(
                error = %err,
                %user_id,
                resource = %event.resource,
                "failed to forward user event to realtime bridge"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[tokio::test]
    async fn unreachable_bridge_is_swallowed() {
        let emitter = BridgeEmitter::new(NotificationClient::new("http://127.0.0.1:9", "key"));
        // Must return normally even though nothing is listening.
        emitter
            .emit_admin_event(SseMessage::new("chat", "message_created", Map::new()))
            .await;
        emitter
            .emit_user_event("usr_1", SseMessage::new("chat", "message_created", Map::new()))
            .await;
    }
}
