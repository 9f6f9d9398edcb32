//! HTTP response types and serialization.

use log::warn;
use serde::Serialize;

use crate::parser::CONTENT_LENGTH;
use crate::server::error::Error;

/// HTTP status codes with their standard reason phrases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    Accepted = 202,
    NoContent = 204,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    PayloadTooLarge = 413,
    RequestHeaderFieldsTooLarge = 431,
    InternalServerError = 500,
    NotImplemented = 501,
}

impl StatusCode {
    /// The numeric status code.
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::NotImplemented => "Not Implemented",
        }
    }
}

/// Represents an HTTP response under construction.
///
/// Handlers receive a fresh `200 OK` response with `Content-Type: text/plain` and
/// populate it in place. `Content-Length` is never stored: [`HttpResponse::serialize`]
/// computes it from the final body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The HTTP status code
    pub status: StatusCode,
    /// The HTTP headers, in the order they were first set
    pub headers: Vec<(String, String)>,
    /// The response body
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

impl HttpResponse {
    /// Create a new HTTP response with the given status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Vec::new(),
        }
    }

    /// Change the status code.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Set a header.
    ///
    /// A header with the same name (compared case-insensitively) is replaced where it
    /// stands; otherwise the header is appended. Carriage returns and line feeds are
    /// stripped from both name and value so a header can never end the line early.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = strip_line_breaks(name.into());
        let value = strip_line_breaks(value.into());
        match self.headers.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Set the content type.
    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.set_header("Content-Type", content_type);
    }

    /// Replace the whole body.
    pub fn set_body(&mut self, content: impl Into<Vec<u8>>) {
        self.body = content.into();
    }

    /// Append to the body.
    pub fn append_to_body(&mut self, content: impl AsRef<[u8]>) {
        self.body.extend_from_slice(content.as_ref());
    }

    /// Serialize `value` as the JSON body and mark it `application/json`.
    pub fn set_json<T: Serialize>(&mut self, value: &T) -> Result<(), Error> {
        let json = serde_json::to_vec(value)?;
        self.set_content_type("application/json");
        self.body = json;
        Ok(())
    }

    /// Add or replace a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the response body with a string.
    pub fn with_body_string(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    /// Convert the response to wire bytes.
    ///
    /// Headers are written in order, followed by the computed `Content-Length`, the
    /// blank line and the raw body. A `Content-Length` set through
    /// [`HttpResponse::set_header`] is dropped in favour of the computed one.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128 + self.body.len());

        let status_line = format!("HTTP/1.1 {} {}\r\n", self.status.as_u16(), self.status.reason_phrase());
        bytes.extend_from_slice(status_line.as_bytes());

        for (name, value) in &self.headers {
            if name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                continue;
            }
            // `headers` is public, so entries pushed directly are cleaned here too.
            let name = strip_line_breaks(name.clone());
            let value = strip_line_breaks(value.clone());
            let header_line = format!("{name}: {value}\r\n");
            bytes.extend_from_slice(header_line.as_bytes());
        }

        let content_length = format!("{CONTENT_LENGTH}: {}\r\n", self.body.len());
        bytes.extend_from_slice(content_length.as_bytes());

        // Add the empty line that separates headers from body
        bytes.extend_from_slice(b"\r\n");

        bytes.extend_from_slice(&self.body);

        bytes
    }
}

fn strip_line_breaks(mut text: String) -> String {
    if text.contains(['\r', '\n']) {
        warn!("Stripping line breaks from response header {text:?}");
        text.retain(|c| c != '\r' && c != '\n');
    }
    text
}
