//! HTTP request parsing and representation.

use log::warn;
use serde::de::DeserializeOwned;

use crate::parser::error::Error;
use crate::parser::method::Method;

/// The blank line separating the head from the body.
pub const HEAD_DELIMITER: &[u8] = b"\r\n\r\n";

/// Header carrying the body length. Located case-sensitively.
pub const CONTENT_LENGTH: &str = "Content-Length";

/// Represents an HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// The HTTP method (GET, POST or Unsupported)
    pub method: Method,
    /// The request path, exactly as sent
    pub path: String,
    /// The HTTP version token, e.g. `HTTP/1.1`
    pub version: String,
    /// The HTTP headers, in the order they appeared on the wire
    pub headers: Vec<(String, String)>,
    /// The request body
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a new HTTP request with an empty body.
    pub fn new(method: Method, path: String, version: String, headers: Vec<(String, String)>) -> Self {
        Self {
            method,
            path,
            version,
            headers,
            body: Vec::new(),
        }
    }

    /// Get a header value.
    ///
    /// Header names are matched case-insensitively; the first occurrence wins.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Check if a header exists.
    pub fn has_header(&self, name: &str) -> bool {
        self.get_header(name).is_some()
    }

    /// The declared body length.
    ///
    /// Only headers named exactly `Content-Length` count. A missing header gives 0, and
    /// so does a value that is not a non-negative integer. Repeated headers must agree.
    pub fn content_length(&self) -> Result<usize, Error> {
        let mut values = self.headers.iter().filter(|(k, _)| k == CONTENT_LENGTH).map(|(_, v)| v);
        let Some(value) = values.next() else {
            return Ok(0);
        };

        if let Some(other) = values.find(|other| *other != value) {
            return Err(Error::ConflictingContentLength(value.clone(), other.clone()));
        }

        match value.parse::<usize>() {
            Ok(length) => Ok(length),
            Err(_) => {
                warn!("Ignoring non-numeric Content-Length {value:?} on {} {}", self.method, self.path);
                Ok(0)
            }
        }
    }

    /// Whether the client expects the connection to stay open after the response.
    ///
    /// An explicit `Connection: close` always wins, then `Connection: keep-alive`.
    /// Without either token HTTP/1.1 persists and every other version closes.
    pub fn keep_alive(&self) -> bool {
        if let Some(connection) = self.get_header("Connection") {
            let tokens = || connection.split(',').map(str::trim);
            if tokens().any(|t| t.eq_ignore_ascii_case("close")) {
                return false;
            }
            if tokens().any(|t| t.eq_ignore_ascii_case("keep-alive")) {
                return true;
            }
        }

        self.version == "HTTP/1.1"
    }

    /// The body decoded as UTF-8, with invalid sequences replaced.
    pub fn body_as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Parse the request body as JSON.
    ///
    /// # Returns
    ///
    /// The parsed JSON value, or an error if the body is not valid JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_json() {
            return Err(Error::MissingHeader("Content-Type: application/json".to_string()));
        }

        let json = serde_json::from_slice(&self.body)?;
        Ok(json)
    }

    /// Check if the request has a JSON body.
    pub fn is_json(&self) -> bool {
        self.get_header("Content-Type")
            .is_some_and(|content_type| content_type.starts_with("application/json"))
    }
}

/// Position of the first head delimiter in `buf`, if any.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_DELIMITER.len())
        .position(|window| window == HEAD_DELIMITER)
}

/// Parse a request head: the request line and header lines, without the
/// terminating blank line.
///
/// The returned request always has an empty body.
pub fn parse_head(head: &[u8]) -> Result<HttpRequest, Error> {
    let head = std::str::from_utf8(head)
        .map_err(|_| Error::MalformedRequestLine("Invalid UTF-8".to_string()))?;

    // Stray blank lines before the request line are tolerated.
    let mut lines = head.lines();
    let request_line = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or(Error::EmptyRequest)?;

    let mut parts = request_line.split_whitespace();
    let (method, path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(path), Some(version)) => (method, path, version),
        _ => return Err(Error::MalformedRequestLine(request_line.to_string())),
    };

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHeaderFormat(line.to_string()))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(HttpRequest::new(
        Method::from_token(method),
        path.to_string(),
        version.to_string(),
        headers,
    ))
}

/// Parse a complete HTTP request held in memory.
///
/// # Arguments
///
/// * `input` - The raw request: head, blank line, and the body if one is declared
///
/// # Returns
///
/// The parsed HTTP request. POST bodies are cut to the declared `Content-Length`;
/// anything after the head of a GET is ignored.
pub fn parse_request(input: &[u8]) -> Result<HttpRequest, Error> {
    if input.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let head_end = find_head_end(input).ok_or(Error::IncompleteRequest { received: input.len() })?;
    let mut request = parse_head(&input[..head_end])?;

    if request.method == Method::POST {
        let declared = request.content_length()?;
        let available = &input[head_end + HEAD_DELIMITER.len()..];
        if available.len() < declared {
            return Err(Error::TruncatedBody {
                expected: declared,
                received: available.len(),
            });
        }
        request.body = available[..declared].to_vec();
    }

    Ok(request)
}
