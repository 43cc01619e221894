//! Wire envelopes pushed to browsers.
//!
//! Both envelopes are serialized exactly once per broadcast; every subscriber
//! receives the same bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Event pushed over an SSE stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseMessage {
    /// Resource the event is about (e.g. `"chat"`, `"order"`).
    pub resource: String,
    /// What happened to it (e.g. `"message_created"`).
    pub resource_type: String,
    pub data: Map<String, Value>,
}

impl SseMessage {
    pub fn new(
        resource: impl Into<String>,
        resource_type: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            resource: resource.into(),
            resource_type: resource_type.into(),
            data,
        }
    }
}

/// Message pushed over a WebSocket connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl WsMessage {
    /// Build a message stamped with the current time.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Utc::now(),
            from: None,
            to: None,
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }
}
