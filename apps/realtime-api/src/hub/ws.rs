//! Hub for bidirectional WebSocket connections.
//!
//! A single control-loop task owns the [`ConnectionRegistry`]. Everything
//! else (HTTP handlers, bridge calls, per-connection pumps) talks to it by
//! sending [`Command`]s, so membership changes and fan-out are processed one
//! at a time in arrival order.

use realtime_common::id::prefix;
use realtime_common::WsMessage;
use tokio::sync::{mpsc, oneshot};

use super::registry::{
    ClientHandle, ClientId, ConnectionRegistry, ConnectionStats, Identity, Payload, Target,
};
use super::HubError;

enum Command {
    Register(ClientHandle),
    Unregister(ClientId),
    Touch(ClientId),
    Deliver { target: Target, payload: Payload },
    Stats(oneshot::Sender<ConnectionStats>),
}

/// Cloneable handle to the WebSocket hub's control loop.
#[derive(Clone)]
pub struct WsHub {
    commands: mpsc::UnboundedSender<Command>,
    capacity: usize,
}

impl WsHub {
    /// Spawn the control loop on the current Tokio runtime. The loop stops
    /// once every handle has been dropped.
    pub fn start(capacity: usize) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { commands, capacity }
    }

    /// Create (but do not register) a client with a fresh outbound queue.
    pub fn new_client(&self, identity: Identity) -> (ClientHandle, mpsc::Receiver<Payload>) {
        ClientHandle::new(prefix::WS_CLIENT, identity, self.capacity)
    }

    pub fn register(&self, client: ClientHandle) {
        self.submit(Command::Register(client));
    }

    /// Remove a client and close its queue. Safe to call more than once.
    pub fn unregister(&self, id: &ClientId) {
        self.submit(Command::Unregister(id.clone()));
    }

    /// Refresh a client's `last_seen`.
    pub fn touch(&self, id: &ClientId) {
        self.submit(Command::Touch(id.clone()));
    }

    pub fn send_to_admin(&self, msg: &WsMessage) -> Result<(), HubError> {
        self.deliver(Target::Admin, msg)
    }

    /// Deliver to every connection whose user ID or email equals `user`.
    pub fn send_to_user(&self, user: &str, msg: &WsMessage) -> Result<(), HubError> {
        self.deliver(Target::User(user.to_string()), msg)
    }

    pub fn broadcast(&self, msg: &WsMessage) -> Result<(), HubError> {
        self.deliver(Target::All, msg)
    }

    /// Consistent snapshot of the current connections.
    ///
    /// The snapshot is taken by the control loop, so it reflects every command
    /// submitted before this call.
    pub async fn stats(&self) -> Result<ConnectionStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Stats(tx))
            .map_err(|_| HubError::Stopped)?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    fn deliver(&self, target: Target, msg: &WsMessage) -> Result<(), HubError> {
        let payload: Payload = serde_json::to_string(msg)
            .map_err(|err| {
                tracing::error!(?err, route = %target, kind = %msg.kind, "failed to serialize ws message");
                err
            })?
            .into();

        self.commands
            .send(Command::Deliver { target, payload })
            .map_err(|_| HubError::Stopped)
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!("websocket hub control loop has stopped");
        }
    }
}

async fn run(mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut registry = ConnectionRegistry::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Register(client) => {
                tracing::info!(
                    client_id = %client.id,
                    user_id = client.identity.user_id.as_deref().unwrap_or(""),
                    is_admin = client.identity.is_admin,
                    "ws client connected"
                );
                registry.register(client);
            }
            Command::Unregister(id) => {
                if registry.unregister(&id) {
                    tracing::info!(client_id = %id, "ws client disconnected");
                }
            }
            Command::Touch(id) => registry.touch(&id),
            Command::Deliver { target, payload } => {
                let report = registry.broadcast(&target, &payload);
                if report.dropped > 0 {
                    tracing::warn!(route = %target, dropped = report.dropped, "dropped slow ws clients");
                }
                tracing::debug!(route = %target, delivered = report.delivered, "ws broadcast");
            }
            Command::Stats(reply) => {
                let _ = reply.send(registry.stats());
            }
        }
    }

    tracing::info!("websocket hub stopped");
}
