use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::messages::ServerMessage;
use super::types::{
    Binding, ClientId, ConnectionId, Member, OutboundMessage, PeerSender, RelayError, Room, RoomId,
};

/// Snapshot of registry sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub rooms: usize,
    pub members: usize,
    pub connections: usize,
}

/// Room and membership state.
///
/// Every method runs to completion without awaiting, so whoever owns the
/// registry serializes all mutations. Deliveries are non-blocking enqueues on
/// the members' channels; a closed channel is ignored.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    bindings: HashMap<ConnectionId, Binding>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `room_id` with `client_id` as its first member.
    ///
    /// Replies `created` or `error` on `tx`. A connection that is already
    /// bound leaves its old room first.
    pub fn create(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        tx: PeerSender,
    ) -> Result<(), RelayError> {
        let result = self.try_create(conn, room_id, password, client_id, &tx);
        if let Err(e) = &result {
            deliver(&tx, &ServerMessage::Error { message: e.to_string() });
        }
        result
    }

    fn try_create(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        tx: &PeerSender,
    ) -> Result<(), RelayError> {
        if room_id.is_empty() || password.is_empty() {
            return Err(RelayError::MissingFields);
        }
        if self.rooms.contains_key(&room_id) {
            return Err(RelayError::RoomExists);
        }

        self.disconnect(conn);

        let mut room = Room::new(password);
        room.members.insert(
            client_id.clone(),
            Member {
                conn,
                tx: tx.clone(),
            },
        );
        self.rooms.insert(room_id.clone(), room);
        self.bindings.insert(
            conn,
            Binding {
                room_id: room_id.clone(),
                client_id: client_id.clone(),
            },
        );

        info!("Room created: {} by client {} ({})", room_id, client_id, conn);
        deliver(tx, &ServerMessage::Created { room_id });
        Ok(())
    }

    /// Join an existing room.
    ///
    /// Every current member and the newcomer are introduced to each other
    /// before the newcomer is inserted. Replies `joined` or `error` on `tx`.
    /// A duplicate `client_id` replaces the previous entry; the displaced
    /// connection is unbound.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        tx: PeerSender,
    ) -> Result<(), RelayError> {
        let result = self.try_join(conn, room_id, password, client_id, &tx);
        if let Err(e) = &result {
            deliver(&tx, &ServerMessage::Error { message: e.to_string() });
        }
        result
    }

    fn try_join(
        &mut self,
        conn: ConnectionId,
        room_id: RoomId,
        password: String,
        client_id: ClientId,
        tx: &PeerSender,
    ) -> Result<(), RelayError> {
        let room = self.rooms.get(&room_id).ok_or(RelayError::RoomNotFound)?;
        if !room.password_matches(&password) {
            return Err(RelayError::WrongPassword);
        }

        // leaving the old binding may have emptied this very room
        self.disconnect(conn);
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or(RelayError::RoomNotFound)?;

        let announce = encode(&ServerMessage::PeerJoined {
            client_id: client_id.clone(),
        });
        for (existing_id, member) in &room.members {
            if let Some(msg) = &announce {
                let _ = member.tx.send(msg.clone());
            }
            deliver(
                tx,
                &ServerMessage::PeerJoined {
                    client_id: existing_id.clone(),
                },
            );
        }

        let displaced = room.members.insert(
            client_id.clone(),
            Member {
                conn,
                tx: tx.clone(),
            },
        );
        if let Some(old) = displaced {
            warn!(
                "Client id {} in room {} taken over by {} (was {})",
                client_id, room_id, conn, old.conn
            );
            self.bindings.remove(&old.conn);
        }
        self.bindings.insert(
            conn,
            Binding {
                room_id: room_id.clone(),
                client_id: client_id.clone(),
            },
        );

        info!("Client {} joined room {} ({})", client_id, room_id, conn);
        deliver(tx, &ServerMessage::Joined { room_id });
        Ok(())
    }

    /// Relay `payload` to `target`. Returns whether anything was delivered.
    pub fn signal(
        &self,
        room_id: &RoomId,
        target: &ClientId,
        from: ClientId,
        payload: Value,
    ) -> bool {
        let Some(member) = self
            .rooms
            .get(room_id)
            .and_then(|room| room.members.get(target))
        else {
            debug!("Dropping signal for {} in room {}", target, room_id);
            return false;
        };

        deliver(&member.tx, &ServerMessage::Signal { from, payload });
        true
    }

    /// Remove `client_id` from `room_id`, notifying the remaining members.
    /// Returns whether a member was removed.
    pub fn leave(&mut self, room_id: &RoomId, client_id: &ClientId) -> bool {
        self.remove_member(room_id, client_id, None)
    }

    /// Cleanup for a closed connection: leaves its bound room, if any.
    /// Calling it for an unbound connection does nothing.
    pub fn disconnect(&mut self, conn: ConnectionId) -> bool {
        let Some(binding) = self.bindings.get(&conn).cloned() else {
            return false;
        };
        let removed = self.remove_member(&binding.room_id, &binding.client_id, Some(conn));
        // a stale binding must not outlive this call
        self.bindings.remove(&conn);
        removed
    }

    fn remove_member(
        &mut self,
        room_id: &RoomId,
        client_id: &ClientId,
        owner: Option<ConnectionId>,
    ) -> bool {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return false;
        };
        if let Some(owner) = owner {
            match room.members.get(client_id) {
                Some(member) if member.conn == owner => {}
                _ => return false,
            }
        }
        let Some(member) = room.members.remove(client_id) else {
            return false;
        };

        if self
            .bindings
            .get(&member.conn)
            .is_some_and(|b| &b.room_id == room_id && &b.client_id == client_id)
        {
            self.bindings.remove(&member.conn);
        }

        if let Some(msg) = encode(&ServerMessage::PeerLeft {
            client_id: client_id.clone(),
        }) {
            for other in room.members.values() {
                let _ = other.tx.send(msg.clone());
            }
        }
        info!("Client {} left room {}", client_id, room_id);

        if room.members.is_empty() {
            self.rooms.remove(room_id);
            info!("Room {} removed (empty)", room_id);
        }
        true
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &RoomId) -> Option<usize> {
        self.rooms.get(room_id).map(|room| room.members.len())
    }

    pub fn binding(&self, conn: ConnectionId) -> Option<&Binding> {
        self.bindings.get(&conn)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            rooms: self.rooms.len(),
            members: self.rooms.values().map(|room| room.members.len()).sum(),
            connections: self.bindings.len(),
        }
    }
}

fn encode(msg: &ServerMessage) -> Option<OutboundMessage> {
    match OutboundMessage::encode(msg) {
        Ok(out) => Some(out),
        Err(e) => {
            warn!("Failed to encode {:?}: {}", msg, e);
            None
        }
    }
}

fn deliver(tx: &PeerSender, msg: &ServerMessage) {
    if let Some(out) = encode(msg) {
        let _ = tx.send(out);
    }
}
