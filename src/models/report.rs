//! Job submission, run report and job result.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use tokio::sync::Semaphore;

use super::profile::ProfileRecord;
use crate::config::JobOverrides;
use crate::error::ScrapeError;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationReason {
    TargetReached,
    QuotaExhausted,
    Blocked,
    ExhaustedUpstream,
    Error,
    Cancelled,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::TargetReached => "TARGET_REACHED",
            TerminationReason::QuotaExhausted => "QUOTA_EXHAUSTED",
            TerminationReason::Blocked => "BLOCKED",
            TerminationReason::ExhaustedUpstream => "EXHAUSTED_UPSTREAM",
            TerminationReason::Error => "ERROR",
            TerminationReason::Cancelled => "CANCELLED",
        }
    }

    /// Whether a job ending here counts as failed.
    ///
    /// Quota and block stops still return usable partial results.
    pub fn is_failure(&self) -> bool {
        matches!(self, TerminationReason::Error | TerminationReason::Cancelled)
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn as_seconds<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64())
}

/// Outcome of one job, built once at the terminal transition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub job_id: String,
    pub requested_count: usize,
    pub fetched_records: Vec<ProfileRecord>,
    pub failed_count: usize,
    pub termination_reason: TerminationReason,
    pub error: Option<String>,
    /// Set when the job failed before the fetch stage, e.g. `AuthExpired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub total_available: Option<u64>,
    pub pages_fetched: u32,
    /// Profile detail HTTP attempts, retries included.
    pub attempts: u32,
    #[serde(rename = "elapsedSeconds", serialize_with = "as_seconds")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Zero-record report for a job that never reached the fetch stage.
    pub fn setup_failure(
        job_id: &str,
        requested_count: usize,
        err: &ScrapeError,
        elapsed: Duration,
    ) -> Self {
        Self {
            job_id: job_id.to_string(),
            requested_count,
            fetched_records: Vec::new(),
            failed_count: 0,
            termination_reason: TerminationReason::Error,
            error: Some(format!("{}: {}", err.kind(), err)),
            error_kind: Some(err.kind().to_string()),
            total_available: None,
            pages_fetched: 0,
            attempts: 0,
            elapsed,
        }
    }

    pub fn fetched_count(&self) -> usize {
        self.fetched_records.len()
    }
}

/// A scrape job as submitted by a caller.
///
/// Accepts the field names older clients send (`curlCommand`, `maxResults`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    #[serde(alias = "curlCommand")]
    pub raw_captured_session: String,
    #[serde(alias = "maxResults")]
    pub target_count: usize,
    /// Worker pool size for this job.
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "proxy")]
    pub proxy_endpoint: Option<String>,
    #[serde(default)]
    pub page_delay_ms: Option<u64>,
    #[serde(default)]
    pub profile_delay_ms: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobRequest {
    pub fn new(raw_captured_session: impl Into<String>, target_count: usize) -> Self {
        Self {
            raw_captured_session: raw_captured_session.into(),
            target_count,
            ..Default::default()
        }
    }

    /// Reject requests that cannot run at all.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.target_count == 0 {
            return Err(ScrapeError::InvalidRequest(
                "targetCount must be greater than zero".into(),
            ));
        }
        if self.target_count > Semaphore::MAX_PERMITS {
            return Err(ScrapeError::InvalidRequest(format!(
                "targetCount must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.concurrency == Some(0) {
            return Err(ScrapeError::InvalidRequest(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.raw_captured_session.trim().is_empty() {
            return Err(ScrapeError::InvalidRequest(
                "rawCapturedSession is empty".into(),
            ));
        }
        Ok(())
    }

    pub fn overrides(&self) -> JobOverrides {
        JobOverrides {
            workers: self.concurrency,
            proxy: self
                .proxy_endpoint
                .as_ref()
                .filter(|p| !p.trim().is_empty())
                .cloned(),
            page_delay_ms: self.page_delay_ms,
            profile_delay_ms: self.profile_delay_ms,
            max_retries: self.max_retries,
        }
    }
}

/// What a caller gets back for a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub success: bool,
    pub job_id: String,
    pub fetched_records: Vec<ProfileRecord>,
    pub total_fetched: usize,
    pub failed_count: usize,
    pub termination_reason: TerminationReason,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub total_available: Option<u64>,
    pub pages_fetched: u32,
    pub scraped_at: DateTime<Utc>,
}

impl From<RunReport> for JobResult {
    fn from(report: RunReport) -> Self {
        Self {
            success: !report.termination_reason.is_failure(),
            job_id: report.job_id,
            total_fetched: report.fetched_records.len(),
            fetched_records: report.fetched_records,
            failed_count: report.failed_count,
            termination_reason: report.termination_reason,
            elapsed_seconds: report.elapsed.as_secs_f64(),
            error: report.error,
            error_kind: report.error_kind,
            total_available: report.total_available,
            pages_fetched: report.pages_fetched,
            scraped_at: Utc::now(),
        }
    }
}
