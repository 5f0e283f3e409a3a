use std::collections::HashMap;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Utf8Bytes;

use super::messages::ServerMessage;

/// Relay errors. The `Display` text is what clients see in `error` frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Missing room or password")]
    MissingFields,

    #[error("Room already exists")]
    RoomExists,

    #[error("Room not found")]
    RoomNotFound,

    #[error("Wrong password")]
    WrongPassword,

    #[error("internal error: {0}")]
    Internal(String),
}

const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Room identifier chosen by the creator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Client identifier, unique within a room only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of one accepted socket ("conn_" + 16 hex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(rand::rng().random())
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; 16];
        for (i, byte) in buf.iter_mut().enumerate() {
            let nibble = ((self.0 >> (60 - i * 4)) & 0xF) as usize;
            *byte = HEX_CHARS[nibble];
        }
        f.write_str("conn_")?;
        f.write_str(std::str::from_utf8(&buf).map_err(|_| fmt::Error)?)
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    /// Serialize a server message once so a broadcast only clones bytes.
    pub fn encode(msg: &ServerMessage) -> Result<Self, serde_json::Error> {
        serde_json::to_string(msg).map(Self::from)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}

/// Outbound half of a client connection as held by the registry.
pub type PeerSender = mpsc::UnboundedSender<OutboundMessage>;

#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub conn: ConnectionId,
    /// Channel for outbound messages to this client.
    pub tx: PeerSender,
}

#[derive(Debug)]
pub(crate) struct Room {
    password: String,
    pub members: HashMap<ClientId, Member>,
}

impl Room {
    pub fn new(password: String) -> Self {
        Self {
            password,
            members: HashMap::new(),
        }
    }

    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

/// The room/client pair a connection currently speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub client_id: ClientId,
}
