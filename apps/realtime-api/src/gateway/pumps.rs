//! The two tasks that drive a single WebSocket connection.
//!
//! The write pump is the only writer of the socket. The read pump only reads
//! to notice a dead or departed peer and to renew the pong deadline. They stop
//! each other: the read pump unregisters the client, which closes the outbound
//! queue and ends the write pump; the write pump drops its `done` signal on a
//! write error, which ends the read pump.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};

use crate::hub::{ClientId, Payload, WsHub};

/// Maximum size of an inbound message. Clients are not expected to send
/// anything but control frames.
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Keepalive timings for one connection.
#[derive(Debug, Clone, Copy)]
pub struct Keepalive {
    /// Time allowed between pongs before the peer is considered dead.
    pub pong_wait: Duration,
    /// Time allowed for a single frame write.
    pub write_wait: Duration,
}

impl Keepalive {
    /// Pings go out at 9/10 of the pong wait so a pong can arrive in time.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            pong_wait: Duration::from_secs(60),
            write_wait: Duration::from_secs(10),
        }
    }
}

/// Drain the outbound queue into the socket and keep the peer pinged.
pub async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut queue: mpsc::Receiver<Payload>,
    keepalive: Keepalive,
    done: oneshot::Sender<()>,
) {
    let period = keepalive.ping_period();
    let mut ticker = time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            next = queue.recv() => {
                let Some(first) = next else {
                    // Hub closed the queue.
                    let _ = write(&mut sink, Message::Close(None), keepalive.write_wait).await;
                    break;
                };
                let frame = coalesce(first, &mut queue);
                if let Err(reason) = write(&mut sink, Message::Text(frame.into()), keepalive.write_wait).await {
                    tracing::debug!(%reason, "ws write failed");
                    break;
                }
            }
            _ = ticker.tick() => {
                if let Err(reason) = write(&mut sink, Message::Ping(Bytes::new()), keepalive.write_wait).await {
                    tracing::debug!(%reason, "ws ping failed");
                    break;
                }
            }
        }
    }

    let _ = done.send(());
}

/// Read frames until the peer goes away, the pong deadline passes or the
/// write pump stops. Always unregisters the client on the way out.
pub async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: WsHub,
    id: ClientId,
    keepalive: Keepalive,
    mut stop: oneshot::Receiver<()>,
) {
    let mut deadline = Instant::now() + keepalive.pong_wait;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            frame = time::timeout_at(deadline, stream.next()) => match frame {
                Err(_) => {
                    tracing::debug!(client_id = %id, "pong deadline passed");
                    break;
                }
                Ok(None) | Ok(Some(Ok(Message::Close(_)))) => break,
                Ok(Some(Err(err))) => {
                    tracing::debug!(client_id = %id, ?err, "ws read failed");
                    break;
                }
                Ok(Some(Ok(Message::Pong(_)))) => {
                    deadline = Instant::now() + keepalive.pong_wait;
                    hub.touch(&id);
                }
                // Inbound data is not part of the protocol.
                Ok(Some(Ok(_))) => {}
            }
        }
    }

    hub.unregister(&id);
}

/// Join the first message with everything already waiting behind it.
fn coalesce(first: Payload, queue: &mut mpsc::Receiver<Payload>) -> String {
    let mut frame = String::from(&*first);
    while let Ok(next) = queue.try_recv() {
        frame.push('\n');
        frame.push_str(&next);
    }
    frame
}

async fn write(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: Message,
    wait: Duration,
) -> Result<(), String> {
    match time::timeout(wait, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("write deadline passed".to_string()),
    }
}
