//! Pagination driver.
//!
//! Walks result pages and hands profile references to the fetch workers.
//! Emission is demand-driven: each reference travels with a permit from the
//! job's demand semaphore, which starts with one permit per requested
//! record. A successful fetch consumes its permit for good; a failed one
//! returns it, letting the driver emit a replacement. Pages are only
//! requested once a permit is available, so the driver never reads a page
//! the job has no use for.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::aggregator::JobEvent;
use super::classifier::{AttemptOutcome, ResponseShape};
use super::pacing::pause;
use super::retry::{RetryDecision, RetryPolicy};
use super::ScrapeContext;
use crate::models::{summaries_from_page, ProfileSummaryRef};

/// A reference cleared for fetching, plus the demand slot it occupies.
#[derive(Debug)]
pub struct Claim {
    pub summary: ProfileSummaryRef,
    pub permit: OwnedSemaphorePermit,
}

/// Why the page walk stopped early.
enum PageStop {
    Cancelled,
    Failed(AttemptOutcome),
}

pub struct PaginationDriver {
    ctx: Arc<ScrapeContext>,
    demand: Arc<Semaphore>,
    page_delay: Duration,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl PaginationDriver {
    pub fn new(
        ctx: Arc<ScrapeContext>,
        demand: Arc<Semaphore>,
        page_delay: Duration,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            demand,
            page_delay,
            retry,
            cancel,
        }
    }

    /// Wait for a demand slot, or `None` once the job is stopping.
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            permit = self.demand.clone().acquire_owned() => permit.ok(),
        }
    }

    /// Run until the upstream is exhausted, a page fails, or the job stops.
    ///
    /// Dropping `claims` on return closes the workers' queue.
    pub async fn run(self, claims: mpsc::Sender<Claim>, events: mpsc::Sender<JobEvent>) {
        let job_id = self.ctx.job_id.as_str();
        let search = &self.ctx.search;
        let last_page = search.pages_for(search.total_available).max(1);

        let mut seen: HashSet<String> = HashSet::new();
        let mut held: Option<OwnedSemaphorePermit> = None;
        let mut page: u32 = 1;
        let mut refs = search.first_page.clone();

        loop {
            if events.send(JobEvent::PageFetched { page }).await.is_err() {
                return;
            }
            if refs.is_empty() {
                info!("[{}] Page {} is empty, no more results", job_id, page);
                let _ = events.send(JobEvent::UpstreamExhausted).await;
                return;
            }

            let mut emitted = 0usize;
            for summary in refs {
                if !seen.insert(summary.profile_id.clone()) {
                    debug!(
                        "[{}] Skipping duplicate profile {} on page {}",
                        job_id, summary.profile_id, page
                    );
                    continue;
                }
                let permit = match held.take() {
                    Some(p) => p,
                    None => match self.acquire().await {
                        Some(p) => p,
                        None => return,
                    },
                };
                if claims.send(Claim { summary, permit }).await.is_err() {
                    return;
                }
                emitted += 1;
            }
            debug!("[{}] Page {} queued {} profiles", job_id, page, emitted);

            if seen.len() as u64 >= search.total_available || u64::from(page) >= last_page {
                info!(
                    "[{}] All {} available results queued",
                    job_id, search.total_available
                );
                let _ = events.send(JobEvent::UpstreamExhausted).await;
                return;
            }

            // Only read the next page once there is demand for it.
            if held.is_none() {
                held = match self.acquire().await {
                    Some(p) => Some(p),
                    None => return,
                };
            }
            if !pause(self.page_delay, &self.cancel).await {
                return;
            }

            page += 1;
            refs = match self.fetch_page(page).await {
                Ok(refs) => refs,
                Err(PageStop::Cancelled) => return,
                Err(PageStop::Failed(outcome)) => {
                    warn!(
                        "[{}] Page {} failed: {:?} {}",
                        job_id, page, outcome.kind, outcome.message
                    );
                    let _ = events.send(JobEvent::PageFailed { page, outcome }).await;
                    return;
                }
            };
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<Vec<ProfileSummaryRef>, PageStop> {
        let ctx = &self.ctx;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let request = ctx.requests.page(&ctx.search, page);
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Err(PageStop::Cancelled),
                r = ctx.transport.post_json(&request) => r,
            };
            let verdict = ctx.classifier.classify(&result, ResponseShape::Page);

            match self.retry.decide(&verdict.outcome, attempt) {
                RetryDecision::StopSuccess => {
                    let body = verdict.payload.unwrap_or_default();
                    return Ok(summaries_from_page(&body, page));
                }
                RetryDecision::Retry(wait) => {
                    warn!(
                        "[{}] Page {} attempt {} failed ({}), retrying in {:?}",
                        ctx.job_id, page, attempt, verdict.outcome.message, wait
                    );
                    if !pause(wait, &self.cancel).await {
                        return Err(PageStop::Cancelled);
                    }
                }
                RetryDecision::StopFailure => return Err(PageStop::Failed(verdict.outcome)),
            }
        }
    }
}
