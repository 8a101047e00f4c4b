//! Captured browser session → session descriptor.
//!
//! A descriptor is everything needed to replay the recruiter's authenticated
//! search: where to send requests, which cookie and headers to send, and the
//! identity fields the detail endpoints are keyed on. Parsing never touches
//! the network.

mod curl;
mod structured;

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

use crate::config::SessionSettings;

/// Headers never replayed from a capture.
const STRIPPED_HEADERS: &[&str] = &["cookie", "content-length", "accept-encoding", "host"];

/// Reasons a capture cannot become a session descriptor.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("capture is empty")]
    Empty,
    #[error("capture is not a curl command")]
    NotCurl,
    #[error("unbalanced {0} quote in capture")]
    UnbalancedQuote(char),
    #[error("flag {0} is missing its value")]
    MissingFlagValue(String),
    #[error("structured capture is invalid: {0}")]
    Structured(String),
    #[error("no URL found in capture")]
    MissingUrl,
    #[error("URL cannot be resolved to a base host: {0}")]
    InvalidUrl(String),
    #[error("no cookie found in capture")]
    MissingCookie,
    #[error("required header missing: {0}")]
    MissingHeader(String),
    #[error("search request must be POST, capture uses {0}")]
    MethodMismatch(String),
    #[error("search request carries no body")]
    MissingBody,
    #[error("search body must be a JSON object")]
    BodyNotObject,
    #[error("search body lacks {0}")]
    MissingIdentity(&'static str),
}

/// Raw request fields pulled out of either capture form.
#[derive(Debug, Default, Clone)]
pub(crate) struct CapturedRequest {
    pub url: String,
    pub method: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Cookie from `-b`/`--cookie` or a structured `cookie` field.
    pub cookie: Option<String>,
    /// Cookie from a `cookie:` header line.
    pub header_cookie: Option<String>,
    pub body: Option<String>,
}

/// Which recruiter product the capture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductFlavor {
    Full,
    Lite,
}

impl ProductFlavor {
    fn from_url(url: &Url) -> Self {
        if url.path().contains("/rdxLite/") {
            ProductFlavor::Lite
        } else {
            ProductFlavor::Full
        }
    }

    /// Path segment of the profile detail endpoint.
    pub fn detail_segment(&self) -> &'static str {
        match self {
            ProductFlavor::Full => "rdx",
            ProductFlavor::Lite => "rdxlite",
        }
    }

    pub fn page_name(&self) -> &'static str {
        match self {
            ProductFlavor::Full => "rdxPreview",
            ProductFlavor::Lite => "rdxLitePreview",
        }
    }

    pub fn flow_name(&self) -> &'static str {
        match self {
            ProductFlavor::Full => "rdxSrp",
            ProductFlavor::Lite => "rdxLiteSrp",
        }
    }
}

/// Recruiter identity carried in the search body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIdentity {
    pub requirement_id: Option<String>,
    pub company_id: i64,
    pub rdx_user_id: String,
    pub rdx_user_name: Option<String>,
}

/// Everything needed to replay one captured search session.
///
/// Built once per job and shared read-only (behind an `Arc`) by that job's
/// tasks.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    /// Scheme, host and port of the search endpoint.
    pub base_url: Url,
    pub search_url: Url,
    pub auth_cookie: String,
    /// Lower-cased header name → value, cookie excluded.
    pub headers: BTreeMap<String, String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub search_body: Value,
    pub identity: SearchIdentity,
    pub flavor: ProductFlavor,
}

impl SessionDescriptor {
    /// Parse a captured request, either a cURL command or a JSON object.
    pub fn parse(raw: &str, settings: &SessionSettings) -> Result<Self, ParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseError::Empty);
        }

        let captured = if trimmed.starts_with('{') {
            structured::parse_structured(trimmed)?
        } else {
            curl::parse_curl(trimmed)?
        };

        Self::from_captured(captured, settings)
    }

    fn from_captured(captured: CapturedRequest, settings: &SessionSettings) -> Result<Self, ParseError> {
        let search_url = Url::parse(&captured.url)
            .map_err(|e| ParseError::InvalidUrl(format!("{}: {}", captured.url, e)))?;
        if !matches!(search_url.scheme(), "http" | "https") || search_url.host_str().is_none() {
            return Err(ParseError::InvalidUrl(captured.url.clone()));
        }
        let base_url = Url::parse(&search_url.origin().ascii_serialization())
            .map_err(|e| ParseError::InvalidUrl(e.to_string()))?;

        let auth_cookie = captured
            .cookie
            .or(captured.header_cookie)
            .map(|c| c.trim().to_string())
            .filter(|c| !cookie_pairs(c).is_empty())
            .ok_or(ParseError::MissingCookie)?;

        // A body implies POST; anything explicit must agree.
        let method = captured.method.unwrap_or_else(|| {
            if captured.body.is_some() {
                "POST".to_string()
            } else {
                "GET".to_string()
            }
        });
        if method != "POST" {
            return Err(ParseError::MethodMismatch(method));
        }
        let raw_body = captured.body.ok_or(ParseError::MissingBody)?;
        let search_body = parse_body(&raw_body)?;
        let identity = extract_identity(&search_body)?;

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in captured.headers {
            if STRIPPED_HEADERS.contains(&name.as_str()) {
                continue;
            }
            headers.insert(name, value);
        }
        for (name, value) in &settings.default_headers {
            headers
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| value.clone());
        }
        for required in &settings.required_headers {
            if !headers.contains_key(&required.to_ascii_lowercase()) {
                return Err(ParseError::MissingHeader(required.clone()));
            }
        }

        let referer = headers.get("referer").cloned();
        let origin = headers.get("origin").cloned();
        let flavor = ProductFlavor::from_url(&search_url);

        Ok(Self {
            base_url,
            search_url,
            auth_cookie,
            headers,
            referer,
            origin,
            search_body,
            identity,
            flavor,
        })
    }

    /// Cookie names (values omitted) for display.
    pub fn cookie_names(&self) -> Vec<String> {
        cookie_pairs(&self.auth_cookie)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Descriptor summary with no secrets, safe to log or print.
    pub fn redacted(&self) -> Value {
        json!({
            "baseUrl": self.base_url.as_str(),
            "searchUrl": self.search_url.as_str(),
            "flavor": self.flavor,
            "cookies": self.cookie_names(),
            "headers": self.headers.keys().collect::<Vec<_>>(),
            "referer": self.referer,
            "origin": self.origin,
            "identity": self.identity,
        })
    }
}

/// Split a cookie header into `(name, value)` pairs.
pub fn cookie_pairs(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|part| {
            let (name, value) = part.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn parse_body(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    let parsed = serde_json::from_str::<Value>(trimmed).ok().or_else(|| {
        if trimmed.starts_with('{') {
            None
        } else {
            serde_json::from_str::<Value>(&format!("{{{}}}", trimmed)).ok()
        }
    });

    match parsed {
        Some(Value::Object(map)) => Ok(Value::Object(map)),
        Some(_) => Err(ParseError::BodyNotObject),
        None => Ok(salvage_body(trimmed)),
    }
}

fn identity_patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r#"requirementId["']?\s*:\s*["']?(\d+)"#).expect("valid regex"),
            Regex::new(r#"companyId["']?\s*:\s*["']?(\d+)"#).expect("valid regex"),
            Regex::new(r#"rdxUserId["']?\s*:\s*["']?([^"',}\s]+)"#).expect("valid regex"),
            Regex::new(r#"rdxUserName["']?\s*:\s*["']([^"']+)"#).expect("valid regex"),
        ]
    })
}

/// Rebuild a search body from a capture whose body is not valid JSON
/// (typically mangled escaping in a pasted command).
fn salvage_body(text: &str) -> Value {
    let [requirement, company, user, user_name] = identity_patterns();
    let capture = |re: &Regex| re.captures(text).map(|c| c[1].to_string());

    let requirement_id = capture(requirement);
    let company_id = capture(company).and_then(|c| c.parse::<i64>().ok());

    json!({
        "requirementId": requirement_id,
        "requirementGroupId": requirement_id,
        "newCandidatesSearch": false,
        "saveSession": true,
        "miscellaneousInfo": {
            "companyId": company_id,
            "rdxUserId": capture(user),
            "rdxUserName": capture(user_name),
        }
    })
}

fn value_as_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn extract_identity(body: &Value) -> Result<SearchIdentity, ParseError> {
    let empty = Map::new();
    let misc = body
        .get("miscellaneousInfo")
        .and_then(|v| v.as_object())
        .unwrap_or(&empty);

    let company_id = misc
        .get("companyId")
        .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()))
        .ok_or(ParseError::MissingIdentity("miscellaneousInfo.companyId"))?;
    let rdx_user_id = value_as_string(misc.get("rdxUserId"))
        .ok_or(ParseError::MissingIdentity("miscellaneousInfo.rdxUserId"))?;

    Ok(SearchIdentity {
        requirement_id: value_as_string(body.get("requirementId")),
        company_id,
        rdx_user_id,
        rdx_user_name: value_as_string(misc.get("rdxUserName")),
    })
}
