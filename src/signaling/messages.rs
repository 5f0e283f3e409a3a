use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ClientId, RoomId};

/// Messages sent from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Create a room and become its first member.
    /// Room id and password are validated by the registry, not the parser.
    Create {
        #[serde(rename = "roomId")]
        room_id: Option<RoomId>,
        password: Option<String>,
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },

    /// Join an existing room
    Join {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        password: String,
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },

    /// Relay an opaque payload to one member of the room
    Signal {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        target: ClientId,
        payload: Value,
        from: ClientId,
    },

    /// Leave the room
    Leave {
        #[serde(rename = "roomId")]
        room_id: RoomId,
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Room created successfully
    Created {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// Joined room successfully
    Joined {
        #[serde(rename = "roomId")]
        room_id: RoomId,
    },

    /// Create/join rejected
    Error { message: String },

    /// Another member of the room (sent to both sides of a join)
    PeerJoined {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },

    /// Relayed payload, untouched
    Signal { from: ClientId, payload: Value },

    /// A member left or disconnected
    PeerLeft {
        #[serde(rename = "clientId")]
        client_id: ClientId,
    },
}
