//! Scripted in-memory upstream for engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use resdex_scrape::scrapers::http_client::{
    ApiRequest, ClientOptions, Connector, RawResponse, Transport, TransportError,
};
use resdex_scrape::{ScrapeError, Settings};

/// Decides the response to a profile attempt given the global attempt
/// number (1-based) and the profile id.
pub type ProfileScript = Arc<dyn Fn(usize, &str) -> Result<RawResponse, TransportError> + Send + Sync>;

/// Decides the response to a page request given the page number.
pub type PageScript = Arc<dyn Fn(u64) -> Option<Result<RawResponse, TransportError>> + Send + Sync>;

pub fn capture(cookie: &str) -> String {
    format!(
        r#"curl 'https://resdex.example.com/cloudgateway-resdex/recruiter-js-profile-listing-services/v0/rdx/search' \
  -H 'accept: application/json' \
  -H 'content-type: application/json' \
  -b '{}' \
  --data-raw '{{"requirementId":"42","miscellaneousInfo":{{"companyId":1001,"rdxUserId":"2002","rdxUserName":"r@example.com"}}}}'"#,
        cookie
    )
}

/// Settings with all waits removed.
pub fn fast_settings() -> Settings {
    let mut settings = Settings::default();
    settings.engine.page_delay_ms = 0;
    settings.engine.profile_delay_ms = 0;
    settings.engine.retry_backoff_ms = 0;
    settings
}

pub fn profile_ok(id: &str) -> Result<RawResponse, TransportError> {
    let body = json!({
        "name": format!("Candidate {}", id),
        "email": format!("{}@example.com", id),
        "mobile": "9999999999",
        "textCv": "Rust, tokio",
        "uniqId": id,
    });
    Ok(RawResponse::new(200, body.to_string()))
}

/// A fake search backend with `total` results split into pages.
pub struct FakeUpstream {
    pub prefix: String,
    pub total: usize,
    pub page_size: usize,
    pub search_response: Mutex<Option<RawResponse>>,
    pub profile_script: ProfileScript,
    pub page_script: Option<PageScript>,
    /// Delay before a profile response is delivered. The request is
    /// counted on arrival.
    pub profile_latency: Duration,
    pub search_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub profile_attempts: AtomicUsize,
    pub attempts_by_profile: Mutex<HashMap<String, usize>>,
    pub cookies_seen: Mutex<Vec<String>>,
}

impl FakeUpstream {
    pub fn new(prefix: &str, total: usize) -> Self {
        Self {
            prefix: prefix.to_string(),
            total,
            page_size: 50,
            search_response: Mutex::new(None),
            profile_script: Arc::new(|_: usize, id: &str| profile_ok(id)),
            page_script: None,
            profile_latency: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
            profile_attempts: AtomicUsize::new(0),
            attempts_by_profile: Mutex::new(HashMap::new()),
            cookies_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_profiles(mut self, script: ProfileScript) -> Self {
        self.profile_script = script;
        self
    }

    pub fn with_pages(mut self, script: PageScript) -> Self {
        self.page_script = Some(script);
        self
    }

    pub fn with_profile_latency(mut self, latency: Duration) -> Self {
        self.profile_latency = latency;
        self
    }

    /// Replace the search response (e.g. with an expired-session reply).
    pub fn with_search_response(self, response: RawResponse) -> Self {
        *self.search_response.lock().unwrap() = Some(response);
        self
    }

    pub fn profile_id(&self, n: usize) -> String {
        format!("{}-{}", self.prefix, n)
    }

    fn tuples(&self, page: u64) -> Vec<Value> {
        let start = (page as usize - 1) * self.page_size;
        let end = (start + self.page_size).min(self.total);
        (start..end)
            .map(|n| {
                json!({
                    "dynamicEncryptedUniqueId": self.profile_id(n),
                    "dynamicEncryptedJsKey": format!("key-{}", n),
                })
            })
            .collect()
    }

    pub fn pages_requested(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }

    pub fn attempts_for(&self, id: &str) -> usize {
        self.attempts_by_profile
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    pub fn respond(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        if let Some(cookie) = request.header("cookie") {
            self.cookies_seen.lock().unwrap().push(cookie.to_string());
        }

        if request.url.ends_with("/jsprofile") {
            let id = request.body["uniqId"].as_str().unwrap_or_default().to_string();
            let n = self.profile_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            *self
                .attempts_by_profile
                .lock()
                .unwrap()
                .entry(id.clone())
                .or_insert(0) += 1;
            return (self.profile_script)(n, &id);
        }

        if request.url.ends_with("/pageChange") {
            self.page_calls.fetch_add(1, Ordering::SeqCst);
            let page = request.body["pageNo"].as_u64().unwrap_or(0);
            if let Some(script) = &self.page_script {
                if let Some(response) = script(page) {
                    return response;
                }
            }
            let body = json!({ "tuples": self.tuples(page) });
            return Ok(RawResponse::new(200, body.to_string()));
        }

        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = self.search_response.lock().unwrap().clone() {
            return Ok(response);
        }
        let body = json!({
            "sid": format!("sid-{}", self.prefix),
            "searchParams": {"sidGroupId": format!("grp-{}", self.prefix)},
            "totalResumes": self.total,
            "tuples": self.tuples(1),
        });
        Ok(RawResponse::new(200, body.to_string()))
    }
}

/// Transport routing each request to an upstream by its cookie.
pub struct RoutedTransport {
    routes: Vec<(String, Arc<FakeUpstream>)>,
}

#[async_trait]
impl Transport for RoutedTransport {
    async fn post_json(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let cookie = request.header("cookie").unwrap_or_default();
        let Some((_, upstream)) = self.routes.iter().find(|(c, _)| c == cookie) else {
            return Ok(RawResponse::new(401, "unknown session"));
        };
        let response = upstream.respond(request);

        // Let other tasks interleave as they would on a real network.
        tokio::task::yield_now().await;
        if request.url.ends_with("/jsprofile") && !upstream.profile_latency.is_zero() {
            tokio::time::sleep(upstream.profile_latency).await;
        }
        response
    }
}

/// Hands every job a fresh routed transport and counts connections.
pub struct FakeConnector {
    routes: Vec<(String, Arc<FakeUpstream>)>,
    pub connects: AtomicUsize,
    pub proxies: Mutex<Vec<Option<String>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            connects: AtomicUsize::new(0),
            proxies: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, cookie: &str, upstream: Arc<FakeUpstream>) -> Self {
        self.routes.push((cookie.to_string(), upstream));
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, options: &ClientOptions) -> Result<Arc<dyn Transport>, ScrapeError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.proxies.lock().unwrap().push(options.proxy.clone());
        Ok(Arc::new(RoutedTransport {
            routes: self.routes.clone(),
        }))
    }
}
