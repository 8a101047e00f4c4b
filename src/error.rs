//! Error taxonomy for scrape jobs.

use thiserror::Error;

use crate::session::ParseError;

/// Result type for engine operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Failures that end a job before (or instead of) the fetch stage.
///
/// Mid-run failures never surface as `ScrapeError`; the aggregator folds
/// them into the run report's termination reason.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("capture parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("session rejected by upstream: {0}")]
    AuthExpired(String),

    #[error("upstream error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("invalid job request: {0}")]
    InvalidRequest(String),

    #[error("too many concurrent jobs")]
    Overloaded,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ScrapeError {
    /// Short machine-readable kind, used as the prefix of report error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Parse(_) => "ParseError",
            ScrapeError::AuthExpired(_) => "AuthExpired",
            ScrapeError::Upstream { .. } => "UpstreamError",
            ScrapeError::InvalidRequest(_) => "InvalidRequest",
            ScrapeError::Overloaded => "Overloaded",
            ScrapeError::Config(_) => "ConfigError",
            ScrapeError::Client(_) => "ClientError",
        }
    }

    pub(crate) fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        ScrapeError::Upstream {
            status,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_display_includes_status() {
        let err = ScrapeError::upstream(Some(502), "bad gateway");
        assert_eq!(err.to_string(), "upstream error (HTTP 502): bad gateway");

        let err = ScrapeError::upstream(None, "connection reset");
        assert_eq!(err.to_string(), "upstream error: connection reset");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ScrapeError::Overloaded.kind(), "Overloaded");
        assert_eq!(
            ScrapeError::Parse(ParseError::MissingCookie).kind(),
            "ParseError"
        );
    }
}
