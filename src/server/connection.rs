//! One client connection driven through repeated request/response cycles.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::parser::{Error as ParserError, HttpRequest, RequestReader};
use crate::server::config::ServerConfig;
use crate::server::error::Error;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::Router;

/// Where a connection is in its request/response cycle.
#[derive(Debug)]
enum ConnectionState {
    ReadingRequest,
    Dispatching(HttpRequest),
    WritingResponse { response: HttpResponse, keep_alive: bool },
    DecidingKeepAlive(bool),
    Closed,
}

/// Serves requests from a single stream until it closes.
pub struct Connection<S> {
    stream: S,
    reader: RequestReader,
    router: Arc<Router>,
    keep_alive_timeout: Duration,
    served: usize,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Bind a connection to `stream`.
    pub fn new(stream: S, router: Arc<Router>, config: &ServerConfig) -> Self {
        Self {
            stream,
            reader: RequestReader::new(config.read_buffer_size, config.max_header_size, config.max_body_size),
            router,
            keep_alive_timeout: config.keep_alive_timeout,
            served: 0,
        }
    }

    /// Serve requests until the connection closes and return how many responses were
    /// sent.
    ///
    /// The stream is shut down before returning, whatever the outcome.
    pub async fn run(mut self) -> Result<usize, Error> {
        let result = self.drive().await;

        if let Err(e) = self.stream.shutdown().await {
            debug!("Error shutting down connection: {e}");
        }

        result.map(|()| self.served)
    }

    async fn drive(&mut self) -> Result<(), Error> {
        let mut state = ConnectionState::ReadingRequest;
        loop {
            state = match state {
                ConnectionState::ReadingRequest => self.read_next().await?,
                ConnectionState::Dispatching(request) => self.dispatch(&request),
                ConnectionState::WritingResponse { response, keep_alive } => {
                    self.write_response(&response.serialize()).await?;
                    self.served += 1;
                    ConnectionState::DecidingKeepAlive(keep_alive)
                }
                ConnectionState::DecidingKeepAlive(keep_alive) => self.decide_keep_alive(keep_alive).await,
                ConnectionState::Closed => return Ok(()),
            };
        }
    }

    async fn read_next(&mut self) -> Result<ConnectionState, Error> {
        match self.reader.read_request(&mut self.stream).await {
            Ok(Some(request)) => {
                debug!("{} {} {}", request.method, request.path, request.version);
                Ok(ConnectionState::Dispatching(request))
            }
            Ok(None) => Ok(ConnectionState::Closed),
            Err(e) => match rejection_status(&e) {
                Some(status) => {
                    warn!("Rejecting request: {e}");
                    Ok(ConnectionState::WritingResponse {
                        response: closing_response(status, e.to_string()),
                        keep_alive: false,
                    })
                }
                None => Err(e.into()),
            },
        }
    }

    fn dispatch(&self, request: &HttpRequest) -> ConnectionState {
        match self.router.resolve(request.method, &request.path) {
            Ok(handler) => {
                let mut response = HttpResponse::default();
                handler(request, &mut response);
                ConnectionState::WritingResponse {
                    response,
                    keep_alive: request.keep_alive(),
                }
            }
            Err(e @ Error::UnsupportedMethod(_)) => {
                warn!("{e}");
                ConnectionState::WritingResponse {
                    response: closing_response(StatusCode::NotImplemented, "Method not implemented"),
                    keep_alive: false,
                }
            }
            Err(e) => {
                debug!("{e}");
                let response = HttpResponse::new(StatusCode::NotFound)
                    .with_body_string(format!("Not found: {}", request.path));
                ConnectionState::WritingResponse {
                    response,
                    keep_alive: request.keep_alive(),
                }
            }
        }
    }

    /// Write all of `bytes`, looping over partial writes.
    async fn write_response(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut written = 0;
        while written < bytes.len() {
            let n = self.stream.write(&bytes[written..]).await.map_err(Error::WriteError)?;
            if n == 0 {
                return Err(Error::WriteError(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("connection closed after {written} of {} response bytes", bytes.len()),
                )));
            }
            written += n;
        }

        self.stream.flush().await.map_err(Error::WriteError)
    }

    async fn decide_keep_alive(&mut self, keep_alive: bool) -> ConnectionState {
        if !keep_alive {
            return ConnectionState::Closed;
        }

        match self.reader.wait_for_data(&mut self.stream, self.keep_alive_timeout).await {
            Ok(true) => ConnectionState::ReadingRequest,
            Ok(false) => ConnectionState::Closed,
            Err(e) => {
                debug!("Idle connection check failed: {e}");
                ConnectionState::Closed
            }
        }
    }
}

/// The status sent back for a request that could not be read, or `None` when the
/// peer is gone and nothing should be written.
fn rejection_status(error: &ParserError) -> Option<StatusCode> {
    match error {
        ParserError::MalformedRequestLine(_)
        | ParserError::InvalidHeaderFormat(_)
        | ParserError::ConflictingContentLength(..)
        | ParserError::EmptyRequest => {
            Some(StatusCode::BadRequest)
        }
        ParserError::HeadersTooLarge { .. } => Some(StatusCode::RequestHeaderFieldsTooLarge),
        ParserError::BodyTooLarge { .. } => Some(StatusCode::PayloadTooLarge),
        _ => None,
    }
}

fn closing_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::new(status)
        .with_header("Connection", "close")
        .with_body_string(message)
}
