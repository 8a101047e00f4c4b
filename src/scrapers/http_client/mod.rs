//! HTTP transport for replayed session requests.
//!
//! The engine talks to the upstream only through [`Transport`], so every job
//! can own its own client (and proxy) and tests can script responses.

mod response;
mod user_agent;

pub use response::{parse_retry_after, RawResponse, TransportError};
pub use user_agent::{resolve_user_agent, DEFAULT_USER_AGENT, IMPERSONATE_USER_AGENTS};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::ScrapeError;

/// One JSON POST against the upstream API.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub url: String,
    /// Header name → value, in send order. Includes the cookie.
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ApiRequest {
    /// Look up a header value by (lower-case) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends API requests and returns fully-read responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, request: &ApiRequest) -> Result<RawResponse, TransportError>;
}

/// Per-job client options.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub proxy: Option<String>,
}

/// Creates a fresh transport for each job so no connection state, cookie
/// or proxy is shared between jobs.
pub trait Connector: Send + Sync {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn Transport>, ScrapeError>;
}

/// Production connector backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestConnector;

impl Connector for ReqwestConnector {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn Transport>, ScrapeError> {
        Ok(Arc::new(HttpClient::new(options)?))
    }
}

/// reqwest-backed transport.
///
/// Cookies are replayed verbatim from the capture as a `cookie` header; the
/// client keeps no cookie jar, matching how the browser session was captured.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(options: &ClientOptions) -> Result<Self, ScrapeError> {
        let mut builder = Client::builder()
            .timeout(options.timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ScrapeError::Client(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| ScrapeError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn post_json(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let start = Instant::now();
        let response = builder.json(&request.body).send().await?;
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let body = response.text().await?;
        let elapsed = start.elapsed();

        debug!(
            "POST {} -> {} ({} bytes in {:?})",
            request.url,
            status,
            body.len(),
            elapsed
        );

        Ok(RawResponse {
            status,
            headers,
            body,
            elapsed,
        })
    }
}

/// Generate a request correlation id the way the web client does:
/// `rlsrp<unix millis>~~<6 lowercase alphanumerics>`.
pub fn transaction_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..6].to_string();
    format!("rlsrp{}~~{}", millis, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_shape() {
        let id = transaction_id();
        let (head, tail) = id.split_once("~~").unwrap();
        assert!(head.starts_with("rlsrp"));
        assert!(head[5..].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(tail.len(), 6);
        assert!(tail
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_invalid_proxy_rejected() {
        let options = ClientOptions {
            timeout: Duration::from_secs(5),
            proxy: Some("::not a proxy::".to_string()),
        };
        assert!(matches!(
            HttpClient::new(&options),
            Err(ScrapeError::Client(_))
        ));
    }

    #[test]
    fn test_api_request_header_lookup() {
        let req = ApiRequest {
            url: "https://example.com".to_string(),
            headers: vec![("cookie".to_string(), "a=1".to_string())],
            body: Value::Null,
        };
        assert_eq!(req.header("cookie"), Some("a=1"));
        assert_eq!(req.header("accept"), None);
    }
}
