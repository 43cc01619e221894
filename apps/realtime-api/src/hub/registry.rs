//! Membership tracking and fan-out shared by the SSE and WebSocket hubs.
//!
//! The registry is a plain data structure with no locking of its own; each hub
//! decides how access to it is serialized. Every mutation keeps three indices
//! in step:
//!
//! - `members`: every live client, keyed by connection ID.
//! - `admins`: the subset of `members` flagged admin.
//! - `identities`: user ID and email → connection IDs, for user targeting.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use utoipa::ToSchema;

/// A message serialized once and shared by every recipient.
pub type Payload = Arc<str>;

/// Server-generated connection identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(prefix: &str) -> Self {
        Self(realtime_common::id::prefixed_ulid(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is on the other end of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub email: Option<String>,
    /// Set only for anonymous connections.
    pub session_id: Option<String>,
    pub is_admin: bool,
}

impl Identity {
    pub fn admin() -> Self {
        Self {
            is_admin: true,
            ..Self::default()
        }
    }

    pub fn user(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            email,
            ..Self::default()
        }
    }

    pub fn anonymous(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Self::default()
        }
    }

    /// Keys under which this identity can be targeted.
    fn keys(&self) -> impl Iterator<Item = &str> {
        let email = self.email.as_deref().filter(|e| Some(*e) != self.user_id.as_deref());
        self.user_id.as_deref().into_iter().chain(email)
    }

    fn is_logged_in(&self) -> bool {
        self.user_id.is_some() || self.email.is_some()
    }
}

/// Routing instruction for a broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Admin,
    /// Exact match on a client's user ID or email.
    User(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("all"),
            Target::Admin => f.write_str("admin"),
            Target::User(id) => write!(f, "user:{id}"),
        }
    }
}

/// A client ready to be registered: identity plus the producing side of its
/// outbound queue.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub identity: Identity,
    pub queue: mpsc::Sender<Payload>,
}

impl ClientHandle {
    /// Create a client with a fresh bounded queue of at least one slot. The
    /// receiver goes to whichever task writes to the browser.
    pub fn new(
        prefix: &str,
        identity: Identity,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Payload>) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id: ClientId::new(prefix),
            identity,
            queue,
        };
        (handle, rx)
    }
}

struct Member {
    identity: Identity,
    last_seen: DateTime<Utc>,
    queue: mpsc::Sender<Payload>,
}

/// Outcome of one broadcast pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    /// Clients removed because their queue was full or already closed.
    pub dropped: usize,
}

/// Lightweight descriptor of one connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub is_admin: bool,
    pub last_seen: DateTime<Utc>,
}

/// Point-in-time view of a hub's connections.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub logged_in_users: usize,
    pub anonymous_users: usize,
    pub admin_users: usize,
    pub connections: Vec<ClientInfo>,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    members: HashMap<ClientId, Member>,
    admins: HashSet<ClientId>,
    identities: HashMap<String, HashSet<ClientId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client. Registering an ID that is already present replaces the
    /// previous entry and closes its queue.
    pub fn register(&mut self, client: ClientHandle) {
        let ClientHandle {
            id,
            identity,
            queue,
        } = client;

        self.remove(&id);

        if identity.is_admin {
            self.admins.insert(id.clone());
        }
        for key in identity.keys() {
            self.identities
                .entry(key.to_string())
                .or_default()
                .insert(id.clone());
        }
        self.members.insert(
            id,
            Member {
                identity,
                last_seen: Utc::now(),
                queue,
            },
        );
    }

    /// Remove a client and close its queue. Returns `false` if it was not
    /// registered.
    pub fn unregister(&mut self, id: &ClientId) -> bool {
        self.remove(id)
    }

    /// Record activity from a client.
    pub fn touch(&mut self, id: &ClientId) {
        if let Some(member) = self.members.get_mut(id) {
            member.last_seen = Utc::now();
        }
    }

    /// Enqueue `payload` for every client matching `target` without waiting.
    ///
    /// A client whose queue is full (or whose receiver is gone) is removed in
    /// the same pass; delivery to the others continues.
    pub fn broadcast(&mut self, target: &Target, payload: &Payload) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut dead = Vec::new();

        for id in self.candidates(target) {
            let Some(member) = self.members.get(&id) else {
                continue;
            };
            match member.queue.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(client_id = %id, "outbound queue full, dropping client");
                    dead.push(id);
                }
                Err(TrySendError::Closed(_)) => dead.push(id),
            }
        }

        for id in dead {
            if self.remove(&id) {
                report.dropped += 1;
            }
        }

        report
    }

    pub fn stats(&self) -> ConnectionStats {
        let mut stats = ConnectionStats {
            total_connections: self.members.len(),
            connections: Vec::with_capacity(self.members.len()),
            ..ConnectionStats::default()
        };

        for (id, member) in &self.members {
            let identity = &member.identity;
            if identity.is_admin {
                stats.admin_users += 1;
            } else if identity.is_logged_in() {
                stats.logged_in_users += 1;
            } else {
                stats.anonymous_users += 1;
            }

            stats.connections.push(ClientInfo {
                id: id.to_string(),
                user_id: identity.user_id.clone(),
                email: identity.email.clone(),
                session_id: identity.session_id.clone(),
                is_admin: identity.is_admin,
                last_seen: member.last_seen,
            });
        }

        // ULIDs sort by creation time.
        stats.connections.sort_by(|a, b| a.id.cmp(&b.id));
        stats
    }

    fn candidates(&self, target: &Target) -> Vec<ClientId> {
        match target {
            Target::All => self.members.keys().cloned().collect(),
            Target::Admin => self.admins.iter().cloned().collect(),
            Target::User(key) => self
                .identities
                .get(key)
                .map(|ids| ids.iter().cloned().collect())
                .unwrap_or_default(),
        }
    }

    fn remove(&mut self, id: &ClientId) -> bool {
        let Some(member) = self.members.remove(id) else {
            return false;
        };

        self.admins.remove(id);
        for key in member.identity.keys() {
            if let Some(ids) = self.identities.get_mut(key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.identities.remove(key);
                }
            }
        }

        // Dropping `member` drops the last sender, which closes the queue and
        // wakes the consumer.
        true
    }
}

#[cfg(test)]
impl ConnectionRegistry {
    pub(crate) fn contains(&self, id: &ClientId) -> bool {
        self.members.contains_key(id)
    }

    pub(crate) fn is_admin(&self, id: &ClientId) -> bool {
        self.admins.contains(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
