//! HTTP server implementation.
//!
//! This module owns everything after a request has been read: routing, response
//! serialization, the per-connection keep-alive cycle and the accept loop.

mod response;
mod config;
mod connection;
mod error;
mod router;
mod http_server;
mod tests;

// Re-export public items
pub use response::{HttpResponse, StatusCode};
pub use config::ServerConfig;
pub use connection::Connection;
pub use error::Error;
pub use router::{Handler, Router};
pub use http_server::HttpServer;
