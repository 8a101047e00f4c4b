//! HTTP response wrappers.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Longest Retry-After we honour.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Fully-read HTTP response.
///
/// Bodies are read eagerly so the classifier can inspect them without
/// holding the connection.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Lower-cased header name → value.
    pub headers: HashMap<String, String>,
    pub body: String,
    pub elapsed: Duration,
}

impl RawResponse {
    /// Build a response with no headers (used by in-memory transports).
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
            elapsed: Duration::ZERO,
        }
    }

    /// Attach a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the server is asking us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.status, 429 | 503)
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Retry-After header in seconds, capped.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(self.headers.get("retry-after").map(|s| s.as_str()))
    }
}

/// Parse Retry-After header value (seconds).
/// Returns duration to wait, or None if header is missing/invalid.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    let value = header_value?;
    value
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER))
}

/// Failure to obtain any HTTP response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}
