//! WebSocket rendezvous: room registry and signaling relay

mod actor;
mod messages;
mod registry;
mod server;
mod types;

pub use actor::RoomManagerHandle;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::{Registry, RegistryStats};
pub use server::{Heartbeat, RelayServer};
pub use types::{Binding, ClientId, ConnectionId, OutboundMessage, PeerSender, RelayError, RoomId};
