//! Job execution.
//!
//! [`Engine`] owns the process-wide settings and the job limiter. Each
//! submitted job gets its own session descriptor, HTTP client, demand
//! semaphore and aggregator; nothing mutable is shared between jobs.

mod limiter;

pub use limiter::JobLimiter;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{JobConfig, Settings};
use crate::error::ScrapeResult;
use crate::models::{JobRequest, JobResult, RunReport};
use crate::scrapers::fetch::{spawn_workers, WorkerSettings};
use crate::scrapers::http_client::{ClientOptions, Connector, ReqwestConnector};
use crate::scrapers::{search, PaginationDriver, RequestFactory, RunAggregator, ScrapeContext};
use crate::session::SessionDescriptor;

/// Runs scrape jobs under the configured concurrency cap.
#[derive(Clone)]
pub struct Engine {
    settings: Arc<Settings>,
    limiter: JobLimiter,
    connector: Arc<dyn Connector>,
}

impl Engine {
    pub fn new(settings: Settings) -> Self {
        Self::with_connector(settings, Arc::new(ReqwestConnector))
    }

    /// Use a custom transport factory.
    pub fn with_connector(settings: Settings, connector: Arc<dyn Connector>) -> Self {
        let limiter = JobLimiter::new(settings.engine.max_jobs, settings.engine.overload);
        Self {
            settings: Arc::new(settings),
            limiter,
            connector,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn active_jobs(&self) -> usize {
        self.limiter.active()
    }

    /// Run a job to completion and convert its report for the caller.
    pub async fn submit(&self, request: JobRequest, cancel: CancellationToken) -> JobResult {
        JobResult::from(self.run(request, cancel).await)
    }

    /// Run a job to completion. Every job produces a report, including jobs
    /// that fail before fetching anything.
    pub async fn run(&self, request: JobRequest, cancel: CancellationToken) -> RunReport {
        let job_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        let requested = request.target_count;

        if let Err(e) = self.settings.check_request(&request) {
            warn!("[{}] Rejected job: {}", job_id, e);
            return RunReport::setup_failure(&job_id, requested, &e, started.elapsed());
        }

        let _slot = tokio::select! {
            _ = cancel.cancelled() => {
                return cancelled_report(&job_id, requested, None, started, "job cancelled while queued");
            }
            slot = self.limiter.acquire() => match slot {
                Ok(slot) => slot,
                Err(e) => {
                    warn!("[{}] Rejected job: {}", job_id, e);
                    return RunReport::setup_failure(&job_id, requested, &e, started.elapsed());
                }
            },
        };

        let report = self.run_job(&job_id, &request, cancel, started).await;
        info!(
            "[{}] Finished: {} with {}/{} records, {} failed, {} pages in {:.1}s",
            job_id,
            report.termination_reason,
            report.fetched_count(),
            report.requested_count,
            report.failed_count,
            report.pages_fetched,
            report.elapsed.as_secs_f64()
        );
        report
    }

    async fn run_job(
        &self,
        job_id: &str,
        request: &JobRequest,
        cancel: CancellationToken,
        started: Instant,
    ) -> RunReport {
        let requested = request.target_count;

        let config = match self.settings.job_config(&request.overrides()) {
            Ok(config) => config,
            Err(e) => return RunReport::setup_failure(job_id, requested, &e, started.elapsed()),
        };
        info!(
            "[{}] Starting scrape: target {}, {} workers{}",
            job_id,
            requested,
            config.workers,
            if config.proxy.is_some() { ", via proxy" } else { "" }
        );

        let mut timeout = job_timeout(&config);

        let ctx = tokio::select! {
            _ = cancel.cancelled() => {
                return cancelled_report(job_id, requested, None, started, "job cancelled");
            }
            _ = &mut timeout => {
                return cancelled_report(job_id, requested, None, started, "job timed out");
            }
            ctx = self.prepare(job_id, request, &config) => match ctx {
                Ok(ctx) => Arc::new(ctx),
                Err(e) => {
                    warn!("[{}] Setup failed: {}", job_id, e);
                    return RunReport::setup_failure(job_id, requested, &e, started.elapsed());
                }
            },
        };

        let total = ctx.search.total_available;
        let mut aggregator = RunAggregator::new(job_id, requested, Some(total), started);

        let pipeline = cancel.child_token();
        let demand = Arc::new(Semaphore::new(requested));
        let (claims_tx, claims_rx) = mpsc::channel(config.workers);
        let (events_tx, mut events_rx) = mpsc::channel(config.workers.saturating_mul(2).saturating_add(4));

        let driver = PaginationDriver::new(
            ctx.clone(),
            demand,
            config.page_delay,
            config.page_retry,
            pipeline.clone(),
        );
        let driver_handle = tokio::spawn(driver.run(claims_tx, events_tx.clone()));
        let workers = spawn_workers(
            config.workers,
            ctx.clone(),
            WorkerSettings {
                profile_delay: config.profile_delay,
                retry: config.profile_retry,
            },
            claims_rx,
            events_tx,
            pipeline.clone(),
        );

        // Drain until every producer is gone; events after the terminal
        // transition only add to the attempt count.
        loop {
            tokio::select! {
                biased;
                event = events_rx.recv() => match event {
                    Some(event) => {
                        if aggregator.apply(event).is_some() {
                            pipeline.cancel();
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled(), if !aggregator.is_terminal() => {
                    aggregator.cancel("job cancelled");
                    pipeline.cancel();
                }
                _ = &mut timeout, if !aggregator.is_terminal() => {
                    aggregator.cancel("job timed out");
                    pipeline.cancel();
                }
            }
        }

        let _ = driver_handle.await;
        futures::future::join_all(workers).await;
        debug!("[{}] Pipeline shut down", job_id);

        aggregator.finish()
    }

    /// Parse the capture, open the job's client and start the search.
    async fn prepare(
        &self,
        job_id: &str,
        request: &JobRequest,
        config: &JobConfig,
    ) -> ScrapeResult<ScrapeContext> {
        let descriptor = SessionDescriptor::parse(&request.raw_captured_session, &config.session)?;
        debug!(
            "[{}] Session for company {} ({} cookies)",
            job_id,
            descriptor.identity.company_id,
            descriptor.cookie_names().len()
        );

        let transport = self.connector.connect(&ClientOptions {
            timeout: config.request_timeout,
            proxy: config.proxy.clone(),
        })?;
        let requests = RequestFactory::new(Arc::new(descriptor), config.user_agent.clone());

        let search = search::initiate(
            transport.as_ref(),
            &requests,
            &config.classifier,
            config.page_size,
            job_id,
        )
        .await?;

        Ok(ScrapeContext {
            job_id: job_id.to_string(),
            transport,
            requests,
            classifier: config.classifier.clone(),
            search,
        })
    }
}

/// Future that resolves when the job's time limit passes, or never.
fn job_timeout(config: &JobConfig) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    match config.job_timeout {
        Some(limit) => Box::pin(tokio::time::sleep(limit)),
        None => Box::pin(std::future::pending()),
    }
}

fn cancelled_report(
    job_id: &str,
    requested: usize,
    total_available: Option<u64>,
    started: Instant,
    message: &str,
) -> RunReport {
    let mut aggregator = RunAggregator::new(job_id, requested, total_available, started);
    aggregator.cancel(message);
    aggregator.finish()
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("max_jobs", &self.limiter.capacity())
            .field("active_jobs", &self.limiter.active())
            .finish()
    }
}

