use std::str::FromStr;
use std::time::Duration;

use crate::gateway::pumps::Keepalive;

/// Realtime service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port of the browser-facing HTTP listener (SSE, WebSocket, admin routes).
    pub port: u16,
    /// Port of the notification bridge listener used by backend instances.
    pub bridge_port: u16,
    /// Pre-shared key for admin streams, admin routes and every bridge call.
    pub admin_api_key: String,
    /// HMAC secret that signs user access tokens.
    pub jwt_access_secret: String,
    /// Capacity of each client's outbound queue. A client whose queue is full
    /// when a broadcast arrives is disconnected.
    pub client_queue_capacity: usize,
    /// How long a WebSocket may go without a pong before it is considered dead.
    pub ws_pong_wait: Duration,
    /// Upper bound on a single WebSocket frame write.
    pub ws_write_wait: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            port: parsed_var("PORT", 9998),
            bridge_port: parsed_var("BRIDGE_PORT", 9999),
            admin_api_key: required_var("ADMIN_API_KEY"),
            jwt_access_secret: required_var("JWT_ACCESS_SECRET"),
            client_queue_capacity: parsed_var("CLIENT_QUEUE_CAPACITY", 256usize).max(1),
            ws_pong_wait: Duration::from_secs(parsed_var("WS_PONG_WAIT_SECS", 60)),
            ws_write_wait: Duration::from_secs(parsed_var("WS_WRITE_WAIT_SECS", 10)),
        }
    }

    pub fn keepalive(&self) -> Keepalive {
        Keepalive {
            pong_wait: self.ws_pong_wait,
            write_wait: self.ws_write_wait,
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| panic!("{name} env var is required"))
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
