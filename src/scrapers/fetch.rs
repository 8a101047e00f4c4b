//! Profile fetch worker pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::aggregator::JobEvent;
use super::classifier::{AttemptOutcome, ResponseShape};
use super::pacing::pause;
use super::pagination::Claim;
use super::retry::{RetryDecision, RetryPolicy};
use super::ScrapeContext;
use crate::models::{ProfileRecord, ProfileSummaryRef};

/// Final result for one reference after retries.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Record(ProfileRecord),
    Failed(AttemptOutcome),
}

/// Pacing and retry applied by every worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Wait before each attempt, including the first.
    pub profile_delay: Duration,
    pub retry: RetryPolicy,
}

/// Fetch one profile, retrying transient failures per `settings.retry`.
///
/// Returns the outcome (`None` if the job was cancelled first) and the
/// number of requests issued, including one cut off by cancellation.
pub async fn fetch_profile(
    ctx: &ScrapeContext,
    summary: &ProfileSummaryRef,
    settings: WorkerSettings,
    cancel: &CancellationToken,
) -> (Option<FetchOutcome>, u32) {
    let mut attempt: u32 = 0;

    loop {
        if !pause(settings.profile_delay, cancel).await {
            return (None, attempt);
        }
        attempt += 1;

        let request = ctx.requests.profile(&ctx.search, summary);
        let result = tokio::select! {
            _ = cancel.cancelled() => return (None, attempt),
            r = ctx.transport.post_json(&request) => r,
        };
        let verdict = ctx.classifier.classify(&result, ResponseShape::Profile);

        match settings.retry.decide(&verdict.outcome, attempt) {
            RetryDecision::StopSuccess => {
                let payload = verdict.payload.unwrap_or_default();
                let record = ProfileRecord::from_payload(&summary.profile_id, payload);
                return (Some(FetchOutcome::Record(record)), attempt);
            }
            RetryDecision::Retry(wait) => {
                debug!(
                    "[{}] Profile {} attempt {} failed ({}), retrying in {:?}",
                    ctx.job_id, summary.profile_id, attempt, verdict.outcome.message, wait
                );
                if !pause(wait, cancel).await {
                    return (None, attempt);
                }
            }
            RetryDecision::StopFailure => {
                warn!(
                    "[{}] Profile {} failed after {} attempt(s): {:?} {}",
                    ctx.job_id,
                    summary.profile_id,
                    attempt,
                    verdict.outcome.kind,
                    verdict.outcome.message
                );
                return (Some(FetchOutcome::Failed(verdict.outcome)), attempt);
            }
        }
    }
}

/// Spawn `count` workers draining `claims` and reporting to `events`.
///
/// Workers exit when the claim queue closes, the event channel closes, or
/// `cancel` fires.
pub fn spawn_workers(
    count: usize,
    ctx: Arc<ScrapeContext>,
    settings: WorkerSettings,
    claims: mpsc::Receiver<Claim>,
    events: mpsc::Sender<JobEvent>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let claims = Arc::new(Mutex::new(claims));
    let mut handles = Vec::with_capacity(count);

    for worker in 0..count {
        let claims = claims.clone();
        let events = events.clone();
        let ctx = ctx.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                let claim = {
                    let mut rx = claims.lock().await;
                    tokio::select! {
                        _ = cancel.cancelled() => None,
                        c = rx.recv() => c,
                    }
                };
                let Some(Claim { summary, permit }) = claim else {
                    break;
                };

                let (outcome, attempts) = fetch_profile(&ctx, &summary, settings, &cancel).await;
                let Some(outcome) = outcome else {
                    if attempts > 0 {
                        let _ = events.send(JobEvent::Abandoned { attempts }).await;
                    }
                    break;
                };

                let event = JobEvent::Fetched {
                    summary,
                    outcome,
                    attempts,
                    permit,
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }
            debug!("[{}] Worker {} finished", ctx.job_id, worker);
        });
        handles.push(handle);
    }

    handles
}
