//! TOML file configuration structures.
//!
//! These structs directly map to the `eventlog.toml` file format. Every
//! section is optional; an absent file behaves like an empty one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Replaces the built-in event types when present.
    #[serde(default)]
    pub event_types: Option<BTreeMap<String, Vec<String>>>,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8000").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
    /// Close connections that send nothing for this many seconds.
    /// Unset means connections may idle forever.
    #[serde(default)]
    pub idle_timeout_secs: Option<u64>,
    /// Capacity of each connection's broadcast queue.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
            idle_timeout_secs: None,
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_outbound_buffer() -> usize {
    eventlog_core::connections::DEFAULT_OUTBOUND_BUFFER
}

/// Database configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}
