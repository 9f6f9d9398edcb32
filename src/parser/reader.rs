//! Incremental request reading off a byte stream.
//!
//! The reader owns the bytes received on one connection. A request is complete once
//! the head delimiter has been seen and the declared body is fully buffered; whatever
//! follows stays buffered as the start of the next request.

use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::parser::error::Error;
use crate::parser::method::Method;
use crate::parser::request::{find_head_end, parse_head, HttpRequest, HEAD_DELIMITER};

/// Reads complete requests from a connection, one at a time.
#[derive(Debug)]
pub struct RequestReader {
    buffer: Vec<u8>,
    chunk: Vec<u8>,
    max_header_size: usize,
    max_body_size: usize,
}

impl RequestReader {
    /// Create a reader that reads `chunk_size` bytes at a time and refuses heads longer
    /// than `max_header_size` or declared bodies longer than `max_body_size`.
    pub fn new(chunk_size: usize, max_header_size: usize, max_body_size: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(chunk_size),
            chunk: vec![0; chunk_size.max(1)],
            max_header_size,
            max_body_size,
        }
    }

    /// Number of received bytes not yet consumed by a request.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether bytes of a following request are already buffered.
    pub fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Read one chunk from the stream into the buffer, returning the byte count.
    async fn fill<S>(&mut self, stream: &mut S) -> Result<usize, Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        let n = stream.read(&mut self.chunk).await?;
        self.buffer.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }

    /// Wait at most `idle` for the next request to start arriving.
    ///
    /// Returns `true` if bytes are buffered (either already or newly read), `false` if
    /// the peer closed the stream or stayed silent for the whole period.
    pub async fn wait_for_data<S>(&mut self, stream: &mut S, idle: Duration) -> Result<bool, Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        if self.has_buffered() {
            return Ok(true);
        }

        match tokio::time::timeout(idle, self.fill(stream)).await {
            Ok(result) => Ok(result? > 0),
            Err(_) => {
                debug!("No further request within {idle:?}");
                Ok(false)
            }
        }
    }

    /// Read the next complete request.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly before any byte of a new request.
    /// Requests with an unsupported method are returned right after their head; their
    /// body, if any, is left unread.
    pub async fn read_request<S>(&mut self, stream: &mut S) -> Result<Option<HttpRequest>, Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        let Some(head_end) = self.read_head(stream).await? else {
            return Ok(None);
        };

        let mut request = parse_head(&self.buffer[..head_end])?;
        self.buffer.drain(..head_end + HEAD_DELIMITER.len());

        if !request.method.is_supported() {
            return Ok(Some(request));
        }

        let declared = request.content_length()?;
        if declared > self.max_body_size {
            return Err(Error::BodyTooLarge {
                declared,
                limit: self.max_body_size,
            });
        }

        self.read_body(stream, declared).await?;
        let body: Vec<u8> = self.buffer.drain(..declared).collect();

        if request.method == Method::POST {
            request.body = body;
        } else if declared > 0 {
            debug!("Discarding {declared}-byte body sent with {} {}", request.method, request.path);
        }

        Ok(Some(request))
    }

    /// Read until the buffer holds a head delimiter, returning its offset.
    async fn read_head<S>(&mut self, stream: &mut S) -> Result<Option<usize>, Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        let mut scanned = 0;
        loop {
            if let Some(offset) = find_head_end(&self.buffer[scanned..]) {
                let head_end = scanned + offset;
                if head_end + HEAD_DELIMITER.len() > self.max_header_size {
                    return Err(Error::HeadersTooLarge {
                        limit: self.max_header_size,
                    });
                }
                return Ok(Some(head_end));
            }

            if self.buffer.len() >= self.max_header_size {
                return Err(Error::HeadersTooLarge {
                    limit: self.max_header_size,
                });
            }

            // A delimiter may straddle the previous and the next chunk.
            scanned = self.buffer.len().saturating_sub(HEAD_DELIMITER.len() - 1);

            if self.fill(stream).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Error::IncompleteRequest {
                    received: self.buffer.len(),
                });
            }
        }
    }

    /// Read until at least `expected` body bytes are buffered. Bytes that arrived
    /// together with the head count toward the total.
    async fn read_body<S>(&mut self, stream: &mut S, expected: usize) -> Result<(), Error>
    where
        S: AsyncRead + Unpin + ?Sized,
    {
        while self.buffer.len() < expected {
            if self.fill(stream).await? == 0 {
                return Err(Error::TruncatedBody {
                    expected,
                    received: self.buffer.len(),
                });
            }
        }
        Ok(())
    }
}
