//! A minimal embeddable HTTP/1.1 server.
//!
//! This library reads requests off raw TCP connections, dispatches them to handlers
//! registered by exact method and path, and writes back responses whose
//! `Content-Length` is always computed from the final body.
//!
//! # Features
//!
//! - Incremental request reading: the head ends at the first blank line, and a
//!   declared body is collected across any number of short reads
//! - GET and POST routing on exact path strings
//! - Persistent connections following the `Connection` header and HTTP version,
//!   including pipelined requests
//! - `400`, `404`, `413`, `431` and `501` responses for requests that cannot be served
//! - JSON helpers for request and response bodies
//!
//! # Examples
//!
//! ## Parsing a request
//!
//! ```
//! use embedhttp::{parse_request, Method};
//!
//! let raw = b"POST /echo HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
//! let request = parse_request(raw).unwrap();
//!
//! assert_eq!(request.method, Method::POST);
//! assert_eq!(request.path, "/echo");
//! assert_eq!(request.body, b"hello");
//! ```
//!
//! ## Building a response
//!
//! ```
//! use embedhttp::HttpResponse;
//!
//! let mut response = HttpResponse::default();
//! response.set_header("X-Request-Id", "42");
//! response.append_to_body("a");
//! response.append_to_body("b");
//!
//! let wire = String::from_utf8(response.serialize()).unwrap();
//! assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
//! assert!(wire.ends_with("Content-Length: 2\r\n\r\nab"));
//! ```
//!
//! ## Running a server
//!
//! ```no_run
//! use embedhttp::{HttpServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), embedhttp::ServerError> {
//!     let mut server = HttpServer::new(ServerConfig::with_port(8080));
//!
//!     server.register_post("/echo", |request, response| {
//!         response.set_body(request.body.clone());
//!     });
//!
//!     server.start().await
//! }
//! ```
//!
//! See the `demos` directory for a complete server.

// Export the parser module
pub mod parser;

// Export the server module
pub mod server;

// Re-export commonly used items for convenience
pub use parser::{Error as ParserError, HttpRequest, Method, RequestReader, parse_request};
pub use server::{Error as ServerError, HttpResponse, HttpServer, Router, ServerConfig, StatusCode};
