//! Structured (JSON) capture form.
//!
//! Accepts what browser extensions and HAR exporters usually produce for a
//! single request: `{"url": ..., "method": ..., "headers": {...}, "body": ...}`.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::{CapturedRequest, ParseError};

#[derive(Debug, Deserialize)]
struct StructuredCapture {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default, alias = "cookies")]
    cookie: Option<String>,
    #[serde(default, alias = "postData", alias = "data")]
    body: Option<serde_json::Value>,
}

pub(crate) fn parse_structured(raw: &str) -> Result<CapturedRequest, ParseError> {
    let structured: StructuredCapture =
        serde_json::from_str(raw).map_err(|e| ParseError::Structured(e.to_string()))?;

    let mut captured = CapturedRequest {
        url: structured.url,
        method: structured.method.map(|m| m.to_ascii_uppercase()),
        cookie: structured.cookie,
        ..Default::default()
    };

    for (name, value) in structured.headers {
        let name = name.trim().to_ascii_lowercase();
        if name == "cookie" {
            captured.header_cookie.get_or_insert(value);
        } else {
            captured.headers.push((name, value));
        }
    }

    captured.body = match structured.body {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    };

    if captured.url.is_empty() {
        return Err(ParseError::MissingUrl);
    }

    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_object_body() {
        let raw = r#"{
            "url": "https://example.com/search",
            "method": "post",
            "headers": {"Cookie": "a=1", "Accept": "application/json"},
            "body": {"requirementId": "7"}
        }"#;
        let captured = parse_structured(raw).unwrap();
        assert_eq!(captured.method.as_deref(), Some("POST"));
        assert_eq!(captured.header_cookie.as_deref(), Some("a=1"));
        assert_eq!(captured.body.as_deref(), Some(r#"{"requirementId":"7"}"#));
        assert_eq!(captured.headers.len(), 1);
    }

    #[test]
    fn test_structured_rejects_garbage() {
        assert!(matches!(
            parse_structured("{\"nope\": 1}"),
            Err(ParseError::Structured(_))
        ));
    }
}
