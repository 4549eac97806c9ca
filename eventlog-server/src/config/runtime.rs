//! Validated configuration used while the server runs.

use std::net::SocketAddr;
use std::time::Duration;

/// Connection-level settings shared by every WebSocket task.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub idle_timeout: Option<Duration>,
    pub outbound_buffer: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}
