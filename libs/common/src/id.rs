use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = realtime_common::id::prefixed_ulid("ws");
/// assert!(id.starts_with("ws_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// WebSocket connection.
    pub const WS_CLIENT: &str = "ws";
    /// SSE stream subscription.
    pub const SSE_CLIENT: &str = "sse";
    /// Session handed to an anonymous WebSocket client.
    pub const ANONYMOUS_SESSION: &str = "anon";
}
