//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of connections served at once. Accepting pauses while the
    /// limit is reached; `1` serves connections strictly one after another.
    pub max_connections: usize,
    /// How many bytes are requested from the socket per read.
    pub read_buffer_size: usize,
    /// The largest accepted request head, delimiter included.
    pub max_header_size: usize,
    /// The largest accepted `Content-Length`.
    pub max_body_size: usize,
    /// How long a persistent connection may stay idle between requests.
    pub keep_alive_timeout: Duration,
}

impl ServerConfig {
    /// Default configuration listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_connections: 1024,
            read_buffer_size: 2048,
            max_header_size: 8192,
            max_body_size: 1024 * 1024,
            keep_alive_timeout: Duration::from_secs(5),
        }
    }
}
