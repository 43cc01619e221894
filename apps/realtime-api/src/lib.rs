pub mod auth;
pub mod bridge;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod routes;

use std::sync::Arc;

use auth::tokens::TokenVerifier;
use config::Config;
use hub::{SseHub, WsHub};

/// Shared application state available to every handler on both listeners.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenVerifier,
    pub sse: Arc<SseHub>,
    pub ws: WsHub,
}

impl AppState {
    /// Build the hubs from configuration. Must be called inside a Tokio
    /// runtime, since the WebSocket hub spawns its control loop.
    pub fn new(config: Config) -> Self {
        let capacity = config.client_queue_capacity;
        Self {
            tokens: TokenVerifier::new(&config.jwt_access_secret),
            sse: Arc::new(SseHub::new(capacity)),
            ws: WsHub::start(capacity),
            config: Arc::new(config),
        }
    }
}
