//! HTTP adapter for submitting scrape jobs.
//!
//! Exposes:
//! - `POST /scrape` - run a job and return its result
//! - `GET /health` - liveness and current job count

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::config::Settings;
use crate::jobs::Engine;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }
}

/// Start the web server.
pub async fn serve(settings: Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(Engine::new(settings));
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::OverloadPolicy;
    use crate::error::ScrapeError;
    use crate::scrapers::http_client::{
        ApiRequest, ClientOptions, Connector, RawResponse, Transport, TransportError,
    };

    /// Transport whose requests never complete.
    struct Stalled;

    #[async_trait]
    impl Transport for Stalled {
        async fn post_json(&self, _request: &ApiRequest) -> Result<RawResponse, TransportError> {
            std::future::pending().await
        }
    }

    struct StalledConnector;

    impl Connector for StalledConnector {
        fn connect(&self, _options: &ClientOptions) -> Result<Arc<dyn Transport>, ScrapeError> {
            Ok(Arc::new(Stalled))
        }
    }

    const CAPTURE: &str = r#"curl 'https://resdex.example.com/v0/rdx/search' -b 'a=1' --data-raw '{"miscellaneousInfo":{"companyId":1,"rdxUserId":"2"}}'"#;

    fn setup_test_app(max_jobs: usize, overload: OverloadPolicy) -> (axum::Router, Engine) {
        let mut settings = Settings::default();
        settings.engine.max_jobs = max_jobs;
        settings.engine.overload = overload;
        let engine = Engine::with_connector(settings, Arc::new(StalledConnector));
        (create_router(AppState::new(engine.clone())), engine)
    }

    fn scrape_request(body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/scrape")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup_test_app(3, OverloadPolicy::Queue);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["activeJobs"], 0);
        assert_eq!(json["maxJobs"], 3);
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_request_is_400() {
        let (app, _) = setup_test_app(1, OverloadPolicy::Queue);
        let response = app
            .oneshot(scrape_request(json!({"curlCommand": CAPTURE, "maxResults": 0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_parse_failure_is_reported() {
        let (app, _) = setup_test_app(1, OverloadPolicy::Queue);
        let response = app
            .oneshot(scrape_request(json!({
                "rawCapturedSession": "curl 'https://x.example.com/search' -d '{}'",
                "targetCount": 5
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["errorKind"], "ParseError");
        assert_eq!(json["terminationReason"], "ERROR");
        assert_eq!(json["fetchedRecords"], json!([]));
    }

    #[tokio::test]
    async fn test_overloaded_is_503() {
        let (app, engine) = setup_test_app(1, OverloadPolicy::Reject);

        let busy = {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(scrape_request(json!({"curlCommand": CAPTURE, "maxResults": 5})))
                    .await
            })
        };
        for _ in 0..100 {
            if engine.active_jobs() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(engine.active_jobs(), 1);

        let response = app
            .oneshot(scrape_request(json!({"curlCommand": CAPTURE, "maxResults": 5})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["errorKind"], "Overloaded");

        busy.abort();
    }
}
