//! Hub for one-way Server-Sent Events streams.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use realtime_common::id::prefix;
use realtime_common::{EventEmitter, SseMessage};
use tokio::sync::mpsc;

use super::registry::{
    ClientHandle, ClientId, ConnectionRegistry, ConnectionStats, DeliveryReport, Identity, Payload,
    Target,
};
use super::HubError;

/// Registry of open SSE streams: an admin group plus per-user groups (one user
/// may have several tabs open).
///
/// The registry sits behind a single mutex that is never held across an
/// `.await`.
pub struct SseHub {
    registry: Mutex<ConnectionRegistry>,
    capacity: usize,
}

impl SseHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Mutex::new(ConnectionRegistry::new()),
            capacity,
        }
    }

    /// Open an admin-scoped stream.
    pub fn register_admin(self: &Arc<Self>) -> SseSubscription {
        self.subscribe(Identity::admin())
    }

    /// Open a stream that receives events targeted at `user_id`.
    pub fn register_user(self: &Arc<Self>, user_id: &str) -> SseSubscription {
        self.subscribe(Identity::user(user_id, None))
    }

    /// Remove a stream. Safe to call more than once.
    pub fn unregister(&self, id: &ClientId) {
        if self.registry.lock().unregister(id) {
            tracing::info!(client_id = %id, "sse client disconnected");
        }
    }

    pub fn broadcast_to_admin(&self, msg: &SseMessage) -> Result<DeliveryReport, HubError> {
        self.deliver(Target::Admin, msg)
    }

    pub fn broadcast_to_user(
        &self,
        user_id: &str,
        msg: &SseMessage,
    ) -> Result<DeliveryReport, HubError> {
        self.deliver(Target::User(user_id.to_string()), msg)
    }

    pub fn stats(&self) -> ConnectionStats {
        self.registry.lock().stats()
    }

    fn subscribe(self: &Arc<Self>, identity: Identity) -> SseSubscription {
        let is_admin = identity.is_admin;
        let (handle, receiver) = ClientHandle::new(prefix::SSE_CLIENT, identity, self.capacity);
        let id = handle.id.clone();

        self.registry.lock().register(handle);
        tracing::info!(client_id = %id, is_admin, "sse client connected");

        SseSubscription {
            id,
            receiver,
            hub: Arc::clone(self),
        }
    }

    fn deliver(&self, target: Target, msg: &SseMessage) -> Result<DeliveryReport, HubError> {
        let payload: Payload = serde_json::to_string(msg)
            .map_err(|err| {
                tracing::error!(?err, route = %target, "failed to serialize sse message");
                err
            })?
            .into();

        let report = self.registry.lock().broadcast(&target, &payload);
        if report.dropped > 0 {
            tracing::warn!(route = %target, dropped = report.dropped, "dropped slow sse clients");
        }
        tracing::debug!(
            route = %target,
            resource = %msg.resource,
            delivered = report.delivered,
            "sse broadcast"
        );
        Ok(report)
    }
}

#[async_trait]
impl EventEmitter for SseHub {
    async fn emit_admin_event(&self, event: SseMessage) {
        // Failures are already logged by the hub.
        let _ = self.broadcast_to_admin(&event);
    }

    async fn emit_user_event(&self, user_id: &str, event: SseMessage) {
        let _ = self.broadcast_to_user(user_id, &event);
    }
}

/// One open SSE stream. Unregisters itself when dropped, so ending the HTTP
/// response is enough to leave the hub.
pub struct SseSubscription {
    id: ClientId,
    receiver: mpsc::Receiver<Payload>,
    hub: Arc<SseHub>,
}

impl SseSubscription {
    #[cfg(test)]
    pub(crate) fn id(&self) -> &ClientId {
        &self.id
    }

    /// Next serialized message, or `None` once the hub has dropped this client.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.receiver.recv().await
    }
}

impl Drop for SseSubscription {
    fn drop(&mut self) {
        self.hub.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn message(resource_type: &str) -> SseMessage {
        let mut data = Map::new();
        data.insert("order_id".into(), json!("ord_1"));
        SseMessage::new("order", resource_type, data)
    }

    #[tokio::test]
    async fn admin_broadcast_reaches_admins_only() {
        let hub = Arc::new(SseHub::new(8));
        let mut admin = hub.register_admin();
        let mut user = hub.register_user("u1");

        let report = hub.broadcast_to_admin(&message("created")).unwrap();

        assert_eq!(report.delivered, 1);
        let payload = admin.recv().await.unwrap();
        assert_eq!(&*payload, serde_json::to_string(&message("created")).unwrap());
        assert!(user.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_broadcast_reaches_every_tab() {
        let hub = Arc::new(SseHub::new(8));
        let mut tab1 = hub.register_user("u1");
        let mut tab2 = hub.register_user("u1");
        let mut other = hub.register_user("u2");

        assert_eq!(hub.broadcast_to_user("u1", &message("shipped")).unwrap().delivered, 2);

        assert!(tab1.recv().await.is_some());
        assert!(tab2.recv().await.is_some());
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_subscription_unregisters() {
        let hub = Arc::new(SseHub::new(8));
        let sub = hub.register_user("u1");
        let id = sub.id().clone();
        assert_eq!(hub.stats().total_connections, 1);

        drop(sub);

        assert_eq!(hub.stats().total_connections, 0);
        // Explicit unregister after the guard already ran is harmless.
        hub.unregister(&id);
        assert_eq!(hub.broadcast_to_user("u1", &message("x")).unwrap().delivered, 0);
    }

    #[tokio::test]
    async fn full_stream_is_dropped_without_affecting_others() {
        let hub = Arc::new(SseHub::new(2));
        let mut slow = hub.register_admin();
        let mut fast = hub.register_admin();

        for _ in 0..2 {
            hub.broadcast_to_admin(&message("tick")).unwrap();
            fast.recv().await.unwrap();
        }
        let report = hub.broadcast_to_admin(&message("tick")).unwrap();

        assert_eq!(report, DeliveryReport { delivered: 1, dropped: 1 });
        assert_eq!(hub.stats().total_connections, 1);
        assert!(fast.recv().await.is_some());

        // The slow stream drains what it had, then ends.
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn hub_acts_as_local_emitter() {
        let hub = Arc::new(SseHub::new(8));
        let mut admin = hub.register_admin();
        let mut user = hub.register_user("u9");
        let emitter: &dyn EventEmitter = &*hub;

        emitter.emit_admin_event(message("created")).await;
        emitter.emit_user_event("u9", message("updated")).await;

        let admin_payload: SseMessage = serde_json::from_str(&admin.recv().await.unwrap()).unwrap();
        let user_payload: SseMessage = serde_json::from_str(&user.recv().await.unwrap()).unwrap();
        assert_eq!(admin_payload.resource_type, "created");
        assert_eq!(user_payload.resource_type, "updated");
    }
}
