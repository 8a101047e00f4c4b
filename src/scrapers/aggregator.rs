//! Run aggregation.
//!
//! The aggregator is the single writer of a job's run state. Pagination and
//! workers report through [`JobEvent`]s; the aggregator decides when the run
//! ends and builds the report exactly once.

use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

use super::classifier::{AttemptOutcome, OutcomeKind};
use super::fetch::FetchOutcome;
use crate::models::{ProfileRecord, ProfileSummaryRef, RunReport, TerminationReason};

/// Progress reported to the aggregator.
#[derive(Debug)]
pub enum JobEvent {
    /// A result page was read (page 1 is the search response itself).
    PageFetched { page: u32 },
    /// The driver has queued every available result.
    UpstreamExhausted,
    /// A page failed for good.
    PageFailed { page: u32, outcome: AttemptOutcome },
    /// A reference finished, successfully or not.
    Fetched {
        summary: ProfileSummaryRef,
        outcome: FetchOutcome,
        attempts: u32,
        permit: OwnedSemaphorePermit,
    },
    /// A reference was dropped by cancellation after `attempts` requests.
    Abandoned { attempts: u32 },
}

/// Accumulated state of one run.
pub struct RunAggregator {
    job_id: String,
    requested: usize,
    total_available: Option<u64>,
    records: Vec<ProfileRecord>,
    seen: HashSet<String>,
    failed: usize,
    attempts: u32,
    pages: u32,
    upstream_exhausted: bool,
    terminal: Option<(TerminationReason, Option<String>)>,
    started: Instant,
}

impl RunAggregator {
    pub fn new(job_id: &str, requested: usize, total_available: Option<u64>, started: Instant) -> Self {
        Self {
            job_id: job_id.to_string(),
            requested,
            total_available,
            records: Vec::new(),
            seen: HashSet::new(),
            failed: 0,
            attempts: 0,
            pages: 0,
            upstream_exhausted: false,
            terminal: None,
            started,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    pub fn termination(&self) -> Option<TerminationReason> {
        self.terminal.as_ref().map(|(reason, _)| *reason)
    }

    pub fn fetched(&self) -> usize {
        self.records.len()
    }

    fn stop(&mut self, reason: TerminationReason, error: Option<String>) -> Option<TerminationReason> {
        info!(
            "[{}] Run stopping: {} ({} records, {} failed)",
            self.job_id,
            reason,
            self.records.len(),
            self.failed
        );
        self.terminal = Some((reason, error));
        Some(reason)
    }

    /// Apply one event. Returns the termination reason when this event ends
    /// the run; events after that only add to the attempt count.
    pub fn apply(&mut self, event: JobEvent) -> Option<TerminationReason> {
        if let JobEvent::Fetched { attempts, .. } | JobEvent::Abandoned { attempts } = &event {
            self.attempts += *attempts;
        }
        if self.is_terminal() {
            return None;
        }

        match event {
            JobEvent::PageFetched { .. } => {
                self.pages += 1;
                None
            }
            JobEvent::Abandoned { .. } => None,
            JobEvent::UpstreamExhausted => {
                self.upstream_exhausted = true;
                None
            }
            JobEvent::PageFailed { page, outcome } => {
                let reason = stop_reason(outcome.kind).unwrap_or(TerminationReason::Error);
                let message = format!("page {} failed: {}", page, outcome.message);
                self.stop(reason, Some(message))
            }
            JobEvent::Fetched {
                summary,
                outcome,
                permit,
                ..
            } => {
                match outcome {
                    FetchOutcome::Record(record) => self.accept(&summary, record, permit),
                    FetchOutcome::Failed(outcome) => {
                        self.failed += 1;
                        drop(permit);
                        match stop_reason(outcome.kind) {
                            Some(reason) => self.stop(
                                reason,
                                Some(format!("profile {}: {}", summary.profile_id, outcome.message)),
                            ),
                            None => None,
                        }
                    }
                }
            }
        }
    }

    fn accept(
        &mut self,
        summary: &ProfileSummaryRef,
        record: ProfileRecord,
        permit: OwnedSemaphorePermit,
    ) -> Option<TerminationReason> {
        if self.records.len() >= self.requested || !self.seen.insert(record.profile_id.clone()) {
            debug!("[{}] Discarding extra result for {}", self.job_id, summary.profile_id);
            return None;
        }

        // The slot is spent; the driver must not refill it.
        permit.forget();
        self.records.push(record);

        if self.records.len() >= self.requested {
            return self.stop(TerminationReason::TargetReached, None);
        }
        None
    }

    /// Mark the run cancelled unless it already ended.
    pub fn cancel(&mut self, message: &str) -> Option<TerminationReason> {
        if self.is_terminal() {
            return None;
        }
        warn!("[{}] {}", self.job_id, message);
        self.stop(TerminationReason::Cancelled, Some(message.to_string()))
    }

    /// Build the report. A run that never hit a stop condition ran out of
    /// upstream results.
    pub fn finish(self) -> RunReport {
        let (termination_reason, error) = self.terminal.unwrap_or_else(|| {
            if !self.upstream_exhausted {
                debug!("[{}] Pipeline closed before upstream end", self.job_id);
            }
            (TerminationReason::ExhaustedUpstream, None)
        });

        RunReport {
            job_id: self.job_id,
            requested_count: self.requested,
            fetched_records: self.records,
            failed_count: self.failed,
            termination_reason,
            error,
            error_kind: None,
            total_available: self.total_available,
            pages_fetched: self.pages,
            attempts: self.attempts,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Outcome kinds that end the whole run.
fn stop_reason(kind: OutcomeKind) -> Option<TerminationReason> {
    match kind {
        OutcomeKind::QuotaExhausted => Some(TerminationReason::QuotaExhausted),
        OutcomeKind::Blocked => Some(TerminationReason::Blocked),
        _ => None,
    }
}
