//! HTTP request parsing module.
//!
//! This module turns raw connection bytes into [`HttpRequest`] values: it locates the
//! end of the head, parses the request line and headers, and collects a body of the
//! declared length across however many reads it takes.

mod request;
mod reader;
mod method;
mod error;

// Re-export public items
pub use request::{HttpRequest, CONTENT_LENGTH, HEAD_DELIMITER};
pub use reader::RequestReader;
pub use method::Method;
pub use error::Error;

// Re-export the parsing functions
pub use request::{find_head_end, parse_head, parse_request};
