//! In-memory connection hubs.
//!
//! Both hubs share [`registry::ConnectionRegistry`] for membership and fan-out.
//! They differ in who owns it: the SSE hub guards it with a mutex, the
//! WebSocket hub hands it to a single control-loop task.

pub mod registry;
pub mod sse;
pub mod ws;

pub use registry::{
    ClientHandle, ClientId, ClientInfo, ConnectionStats, DeliveryReport, Identity, Payload, Target,
};
pub use sse::{SseHub, SseSubscription};
pub use ws::WsHub;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("hub control loop is not running")]
    Stopped,
}
