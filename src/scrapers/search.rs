//! Search initialization.

use serde_json::Value;
use tracing::{debug, info};

use super::api::RequestFactory;
use super::classifier::{ResponseClassifier, ResponseShape};
use super::http_client::Transport;
use crate::error::{ScrapeError, ScrapeResult};
use crate::models::{summaries_from_page, SearchContext};

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn total_count(body: &Value) -> Option<u64> {
    let value = body.get("totalResumes")?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Issue the captured search once and build the search context from it.
///
/// Never retried: a failure here means the capture itself is unusable
/// (`AuthExpired`) or the upstream refused the search (`Upstream`).
pub async fn initiate(
    transport: &dyn Transport,
    requests: &RequestFactory,
    classifier: &ResponseClassifier,
    page_size: usize,
    job_id: &str,
) -> ScrapeResult<SearchContext> {
    let request = requests.search();
    debug!("[{}] Starting search at {}", job_id, request.url);

    let attempt = transport.post_json(&request).await;
    let verdict = classifier.classify(&attempt, ResponseShape::Search);
    let outcome = verdict.outcome;

    let body = match verdict.payload {
        Some(body) => body,
        None if outcome.is_session_rejection() => {
            return Err(ScrapeError::AuthExpired(outcome.message));
        }
        None => {
            return Err(ScrapeError::upstream(
                outcome.raw_status,
                format!("search failed ({:?}): {}", outcome.kind, outcome.message),
            ));
        }
    };

    let search_id = id_string(body.get("sid"))
        .ok_or_else(|| ScrapeError::upstream(outcome.raw_status, "search response has no sid"))?;
    let group_id = id_string(body.get("searchParams").and_then(|p| p.get("sidGroupId")));
    let first_page = summaries_from_page(&body, 1);
    let total_available = total_count(&body).unwrap_or(first_page.len() as u64);

    info!(
        "[{}] Search {} reports {} resumes ({} on page 1)",
        job_id,
        search_id,
        total_available,
        first_page.len()
    );

    Ok(SearchContext {
        search_id,
        group_id,
        total_available,
        page_size,
        first_page,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSettings;
    use crate::scrapers::http_client::{ApiRequest, RawResponse, TransportError};
    use crate::session::SessionDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Fixed(Result<RawResponse, TransportError>);

    #[async_trait]
    impl Transport for Fixed {
        async fn post_json(&self, _request: &ApiRequest) -> Result<RawResponse, TransportError> {
            self.0.clone()
        }
    }

    fn requests() -> RequestFactory {
        let raw = r#"curl 'https://resdex.example.com/v0/rdx/search' -b 'a=1' --data-raw '{"miscellaneousInfo":{"companyId":1,"rdxUserId":"2"}}'"#;
        let desc = SessionDescriptor::parse(raw, &SessionSettings::default()).unwrap();
        RequestFactory::new(Arc::new(desc), None)
    }

    async fn run(response: Result<RawResponse, TransportError>) -> ScrapeResult<SearchContext> {
        initiate(
            &Fixed(response),
            &requests(),
            &ResponseClassifier::default(),
            50,
            "test",
        )
        .await
    }

    #[tokio::test]
    async fn test_initiate_success() {
        let body = json!({
            "sid": 998877,
            "searchParams": {"sidGroupId": "g-1"},
            "totalResumes": "230",
            "tuples": [
                {"dynamicEncryptedUniqueId": "u1", "dynamicEncryptedJsKey": "k1"},
                {"dynamicEncryptedUniqueId": "u2", "dynamicEncryptedJsKey": "k2"}
            ]
        });
        let ctx = run(Ok(RawResponse::new(200, body.to_string()))).await.unwrap();
        assert_eq!(ctx.search_id, "998877");
        assert_eq!(ctx.group_id.as_deref(), Some("g-1"));
        assert_eq!(ctx.total_available, 230);
        assert_eq!(ctx.first_page.len(), 2);
        assert_eq!(ctx.page_size, 50);
    }

    #[tokio::test]
    async fn test_initiate_missing_total_uses_page() {
        let body = json!({"sid": "s", "tuples": [{"dynamicEncryptedUniqueId": "u1"}]});
        let ctx = run(Ok(RawResponse::new(200, body.to_string()))).await.unwrap();
        assert_eq!(ctx.total_available, 1);
    }

    #[tokio::test]
    async fn test_initiate_expired_session() {
        let err = run(Ok(RawResponse::new(401, "{}"))).await.unwrap_err();
        assert!(matches!(err, ScrapeError::AuthExpired(_)));

        let err = run(Ok(RawResponse::new(200, "Please login to continue")))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::AuthExpired(_)));
    }

    #[tokio::test]
    async fn test_initiate_upstream_errors() {
        let err = run(Ok(RawResponse::new(502, "bad gateway"))).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Upstream { status: Some(502), .. }));

        let err = run(Ok(RawResponse::new(200, r#"{"tuples": []}"#)))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Upstream { .. }));

        let err = run(Err(TransportError::Timeout)).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Upstream { status: None, .. }));
    }
}
