//! Error types for the HTTP server.

use thiserror::Error;

use crate::parser::{Error as ParserError, Method};

/// Errors that can occur during HTTP server operation.
///
/// Only [`Error::Setup`] stops the server. Every other variant is local to the
/// connection it happened on.
#[derive(Debug, Error)]
pub enum Error {
    /// Binding the listening socket failed.
    #[error("Failed to bind {addr}: {source}")]
    Setup {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Reading or parsing a request failed.
    #[error("Parse error: {0}")]
    ParseError(#[from] ParserError),

    /// Writing a response failed.
    #[error("Write error: {0}")]
    WriteError(#[source] std::io::Error),

    /// The request used a method other than GET or POST.
    #[error("Unsupported method for path: {0}")]
    UnsupportedMethod(String),

    /// No handler is registered for the method and path.
    #[error("No route for {0} {1}")]
    NotFound(Method, String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
