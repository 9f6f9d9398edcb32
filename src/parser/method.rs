//! HTTP request methods.

use std::fmt;

/// The request methods this server understands.
///
/// Only `GET` and `POST` can be routed. Every other token is classified as
/// [`Method::Unsupported`] so the connection can refuse it without a parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method: Requests a representation of the specified resource.
    GET,
    /// POST method: Submits data to be processed to the identified resource.
    POST,
    /// Any method token other than `GET` or `POST`.
    Unsupported,
}

impl Method {
    /// Classify a request-line method token. Matching is case-sensitive.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "POST" => Method::POST,
            _ => Method::Unsupported,
        }
    }

    /// Whether a route can ever be registered for this method.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Method::Unsupported)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::Unsupported => "UNSUPPORTED",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
