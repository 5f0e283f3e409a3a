use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RoomManagerHandle;
use super::messages::ClientMessage;
use super::types::{ConnectionId, OutboundMessage, PeerSender, RelayError};

/// WebSocket keepalive timings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RelayServer {
    listener: TcpListener,
    handle: RoomManagerHandle,
    heartbeat: Heartbeat,
}

impl RelayServer {
    /// Bind the listener and start the room manager.
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Relay server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle: RoomManagerHandle::spawn(),
            heartbeat: Heartbeat::default(),
        })
    }

    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> RoomManagerHandle {
        self.handle.clone()
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let heartbeat = self.heartbeat;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, heartbeat).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Pulse {
    SendPing,
    Expired,
}

/// Ping schedule of one connection. At most one ping is outstanding; the
/// connection expires when it is not answered within the pong timeout or
/// before the next ping is due.
struct Liveness {
    ticker: Interval,
    pong_timeout: Duration,
    pong_deadline: Option<Instant>,
}

impl Liveness {
    fn new(heartbeat: Heartbeat) -> Self {
        let mut ticker = tokio::time::interval_at(
            Instant::now() + heartbeat.ping_interval,
            heartbeat.ping_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            pong_timeout: heartbeat.pong_timeout,
            pong_deadline: None,
        }
    }

    async fn next_pulse(&mut self) -> Pulse {
        let deadline = self.pong_deadline;
        let overdue = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        let ticked = tokio::select! {
            _ = self.ticker.tick() => true,
            _ = overdue => false,
        };

        if !ticked || self.pong_deadline.is_some() {
            return Pulse::Expired;
        }
        self.pong_deadline = Some(Instant::now() + self.pong_timeout);
        Pulse::SendPing
    }

    fn pong_received(&mut self) {
        self.pong_deadline = None;
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
    heartbeat: Heartbeat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let conn = ConnectionId::generate();
    info!("WebSocket connection {} from {}", conn, addr);

    // relayed frames and pings share one writer
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ping_tx, mut ping_rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(msg) = rx.recv() => Message::Text(msg.into_inner()),
                Some(ping) = ping_rx.recv() => ping,
                else => break,
            };
            if ws_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    let mut liveness = Liveness::new(heartbeat);

    loop {
        let frame = tokio::select! {
            pulse = liveness.next_pulse() => {
                match pulse {
                    Pulse::SendPing => {
                        if ping_tx.send(Message::Ping(Bytes::new())).is_err() {
                            break;
                        }
                        debug!("Ping sent to {}", conn);
                        continue;
                    }
                    Pulse::Expired => {
                        warn!("No Pong from {}, disconnecting", conn);
                        break;
                    }
                }
            }
            frame = ws_rx.next() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                warn!("WebSocket error on {}: {}", conn, e);
                break;
            }
            None => break,
        };

        let text = match &frame {
            Message::Text(text) => Some(text.as_str()),
            Message::Binary(data) => match std::str::from_utf8(data) {
                Ok(text) => Some(text),
                Err(_) => {
                    debug!("Ignoring non-UTF-8 binary frame from {}", conn);
                    None
                }
            },
            Message::Pong(_) => {
                liveness.pong_received();
                None
            }
            Message::Close(_) => {
                info!("Close received from {}", conn);
                break;
            }
            _ => None,
        };

        if let Some(text) = text {
            if let Err(e) = handle_text_message(text, conn, &tx, &handle).await {
                warn!("Message handling error on {}: {}", conn, e);
            }
        }
    }

    if let Err(e) = handle.disconnect(conn).await {
        warn!("Cleanup for {} failed: {}", conn, e);
    }

    writer.abort();
    info!("WebSocket disconnected: {} ({})", conn, addr);

    Ok(())
}

/// Dispatch one JSON frame. Unparseable frames are dropped, and create/join
/// rejections have already been sent to the client by the registry. The only
/// error returned is an unreachable room manager, which the caller logs.
async fn handle_text_message(
    text: &str,
    conn: ConnectionId,
    tx: &PeerSender,
    handle: &RoomManagerHandle,
) -> Result<(), RelayError> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("Ignoring frame from {}: {}", conn, e);
            return Ok(());
        }
    };

    let result = match client_msg {
        ClientMessage::Create {
            room_id,
            password,
            client_id,
        } => {
            handle
                .create_room(
                    conn,
                    room_id.unwrap_or_default(),
                    password.unwrap_or_default(),
                    client_id,
                    tx.clone(),
                )
                .await
        }

        ClientMessage::Join {
            room_id,
            password,
            client_id,
        } => {
            handle
                .join_room(conn, room_id, password, client_id, tx.clone())
                .await
        }

        ClientMessage::Signal {
            room_id,
            target,
            payload,
            from,
        } => handle.signal(room_id, target, from, payload).await,

        ClientMessage::Leave { room_id, client_id } => {
            handle.leave_room(room_id, client_id).await
        }
    };

    match result {
        Err(RelayError::Internal(msg)) => Err(RelayError::Internal(msg)),
        Err(e) => {
            debug!("Request from {} rejected: {}", conn, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}
