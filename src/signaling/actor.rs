use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::registry::{Registry, RegistryStats};
use super::types::{ClientId, ConnectionId, PeerSender, RelayError, RoomId};

const COMMAND_QUEUE_SIZE: usize = 1024;

/// Commands sent to the room manager actor
pub(crate) enum RoomCommand {
    Create {
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        peer_tx: PeerSender,
        reply: oneshot::Sender<Result<(), RelayError>>,
    },
    Join {
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        peer_tx: PeerSender,
        reply: oneshot::Sender<Result<(), RelayError>>,
    },
    Signal {
        room_id: RoomId,
        target: ClientId,
        from: ClientId,
        payload: Value,
    },
    Leave {
        room_id: RoomId,
        client_id: ClientId,
    },
    Disconnect {
        conn: ConnectionId,
    },
    Stats {
        reply: oneshot::Sender<RegistryStats>,
    },
}

/// Owns the registry; runs until every handle is dropped.
pub(crate) async fn room_manager_actor(mut rx: mpsc::Receiver<RoomCommand>) {
    let mut registry = Registry::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RoomCommand::Create {
                conn,
                room_id,
                password,
                client_id,
                peer_tx,
                reply,
            } => {
                let result = registry.create(conn, room_id, password, client_id, peer_tx);
                let _ = reply.send(result);
            }

            RoomCommand::Join {
                conn,
                room_id,
                password,
                client_id,
                peer_tx,
                reply,
            } => {
                let result = registry.join(conn, room_id, password, client_id, peer_tx);
                let _ = reply.send(result);
            }

            RoomCommand::Signal {
                room_id,
                target,
                from,
                payload,
            } => {
                registry.signal(&room_id, &target, from, payload);
            }

            RoomCommand::Leave { room_id, client_id } => {
                registry.leave(&room_id, &client_id);
            }

            RoomCommand::Disconnect { conn } => {
                if registry.disconnect(conn) {
                    debug!("Cleaned up membership of {}", conn);
                }
            }

            RoomCommand::Stats { reply } => {
                let _ = reply.send(registry.stats());
            }
        }
    }

    info!("Room manager stopped ({} rooms dropped)", registry.room_count());
}

/// Handle to communicate with the room manager actor
#[derive(Clone)]
pub struct RoomManagerHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomManagerHandle {
    /// Spawn the room manager on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel::<RoomCommand>(COMMAND_QUEUE_SIZE);
        tokio::spawn(room_manager_actor(rx));
        Self { tx }
    }

    async fn submit(&self, cmd: RoomCommand) -> Result<(), RelayError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }

    /// Create a room and become its first member.
    /// The `created`/`error` reply is delivered on `peer_tx`.
    pub async fn create_room(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        peer_tx: PeerSender,
    ) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(RoomCommand::Create {
            conn,
            room_id,
            password,
            client_id,
            peer_tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))?
    }

    /// Join an existing room
    pub async fn join_room(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        peer_tx: PeerSender,
    ) -> Result<(), RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(RoomCommand::Join {
            conn,
            room_id,
            password,
            client_id,
            peer_tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))?
    }

    /// Relay a payload; fire-and-forget.
    pub async fn signal(
        &self,
        room_id: RoomId,
        target: ClientId,
        from: ClientId,
        payload: Value,
    ) -> Result<(), RelayError> {
        self.submit(RoomCommand::Signal {
            room_id,
            target,
            from,
            payload,
        })
        .await
    }

    pub async fn leave_room(&self, room_id: RoomId, client_id: ClientId) -> Result<(), RelayError> {
        self.submit(RoomCommand::Leave { room_id, client_id }).await
    }

    /// Drop whatever membership `conn` still holds.
    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), RelayError> {
        self.submit(RoomCommand::Disconnect { conn }).await
    }

    pub async fn stats(&self) -> Result<RegistryStats, RelayError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(RoomCommand::Stats { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| RelayError::Internal("actor channel closed".to_string()))
    }
}
