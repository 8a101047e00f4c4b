//! HTTP request handlers for the job API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::AppState;
use crate::models::{JobRequest, JobResult};

/// Status code for a finished job. Jobs that ran at all return 200 with
/// the outcome in the body.
fn status_for(result: &JobResult) -> StatusCode {
    match result.error_kind.as_deref() {
        Some("Overloaded") => StatusCode::SERVICE_UNAVAILABLE,
        Some("InvalidRequest") => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

/// Run one scrape job and return its result.
///
/// The job is cancelled if the client goes away before it finishes.
pub async fn scrape(
    State(state): State<AppState>,
    Json(request): Json<JobRequest>,
) -> Response {
    tracing::info!(
        "Received scrape request for {} profiles",
        request.target_count
    );

    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();

    let result = state.engine.submit(request, cancel).await;
    (status_for(&result), Json(result)).into_response()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub timestamp: chrono::DateTime<Utc>,
    pub active_jobs: usize,
    pub max_jobs: usize,
}

/// Liveness probe.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(Health {
        status: "healthy",
        timestamp: Utc::now(),
        active_jobs: state.engine.active_jobs(),
        max_jobs: state.engine.settings().engine.max_jobs,
    })
}
