//! Command-line and environment configuration.

use std::time::Duration;

use clap::Parser;

use crate::signaling::Heartbeat;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Room rendezvous and signaling relay
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "rendezvous", version, about = "Room rendezvous and signaling relay")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "BIND_ADDRESS", default_value = DEFAULT_BIND_ADDRESS)]
    pub bind_address: String,

    /// Seconds between WebSocket pings
    #[arg(long, env = "PING_INTERVAL_SECS", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub ping_interval_secs: u64,

    /// Seconds a client has to answer a ping
    #[arg(long, env = "PONG_TIMEOUT_SECS", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub pong_timeout_secs: u64,
}

impl Config {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat {
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            pong_timeout: Duration::from_secs(self.pong_timeout_secs),
        }
    }
}
