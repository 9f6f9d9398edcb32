//! Error types for reading and parsing HTTP requests.

use thiserror::Error;

/// Errors that can occur while reading or parsing an HTTP request.
#[derive(Debug, Error)]
pub enum Error {
    /// The request line has fewer than three tokens or is not valid UTF-8.
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// A header line has no `name: value` separator.
    #[error("Invalid header format: {0}")]
    InvalidHeaderFormat(String),

    /// The input holds no request at all.
    #[error("Empty request")]
    EmptyRequest,

    /// The stream ended before the blank line terminating the head.
    #[error("Incomplete request: {received} bytes received without a complete head")]
    IncompleteRequest { received: usize },

    /// The head grew past the configured limit without terminating.
    #[error("Request head exceeds {limit} bytes")]
    HeadersTooLarge { limit: usize },

    /// `Content-Length` appears more than once with different values.
    #[error("Conflicting Content-Length values: {0:?} and {1:?}")]
    ConflictingContentLength(String, String),

    /// The declared `Content-Length` exceeds the configured limit.
    #[error("Declared body of {declared} bytes exceeds limit of {limit} bytes")]
    BodyTooLarge { declared: usize, limit: usize },

    /// The stream ended before the declared body was fully received.
    #[error("Truncated body: expected {expected} bytes, received {received}")]
    TruncatedBody { expected: usize, received: usize },

    /// Reading from the connection failed.
    #[error("I/O error while reading request: {0}")]
    Io(#[from] std::io::Error),

    /// A header required by the operation is missing.
    #[error("Required header is missing: {0}")]
    MissingHeader(String),

    /// Error parsing JSON.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}
