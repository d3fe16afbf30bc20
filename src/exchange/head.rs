//! Response head snapshot.

use http::response::Parts;
use hyper::header::{HeaderMap, CONNECTION};
use hyper::{StatusCode, Version};

/// Status line and headers of a response, captured once when the transport
/// reports them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    status: StatusCode,
    reason: String,
    version: Version,
    headers: HeaderMap,
    keep_alive: bool,
}

impl ResponseHead {
    /// Build a head with the canonical reason phrase and a keep-alive flag
    /// derived from the version and `Connection` header.
    pub fn new(status: StatusCode, version: Version, headers: HeaderMap) -> Self {
        let keep_alive = derive_keep_alive(version, &headers);
        Self {
            status,
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            version,
            headers,
            keep_alive,
        }
    }

    /// Build a head from hyper response parts.
    pub fn from_parts(parts: &Parts) -> Self {
        Self::new(parts.status, parts.version, parts.headers.clone())
    }

    /// Replace the reason phrase with the one the server actually sent.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase, canonical unless the server sent its own.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Protocol version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Protocol version as `(major, minor)`.
    pub fn version_numbers(&self) -> (u8, u8) {
        match self.version {
            Version::HTTP_09 => (0, 9),
            Version::HTTP_10 => (1, 0),
            Version::HTTP_2 => (2, 0),
            Version::HTTP_3 => (3, 0),
            _ => (1, 1),
        }
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the connection may be reused after this response.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

fn derive_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let mut close = false;
    let mut keep_alive = false;
    for value in headers.get_all(CONNECTION) {
        let Ok(value) = value.to_str() else { continue };
        for token in value.split(',').map(str::trim) {
            if token.eq_ignore_ascii_case("close") {
                close = true;
            } else if token.eq_ignore_ascii_case("keep-alive") {
                keep_alive = true;
            }
        }
    }

    match version {
        Version::HTTP_09 => false,
        Version::HTTP_10 => keep_alive && !close,
        Version::HTTP_11 => !close,
        // Connection-specific headers are not used from HTTP/2 on.
        _ => true,
    }
}
