pub mod bridge;
pub mod client;
pub mod emitter;
pub mod envelope;
pub mod id;

pub use client::{BridgeError, NotificationClient};
pub use emitter::{BridgeEmitter, EventEmitter};
pub use envelope::{SseMessage, WsMessage};
