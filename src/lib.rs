//! resdex-scrape - session-bound résumé search scraping engine.
//!
//! Replays a recruiter's captured browser session against the Resdex search
//! API, pages through the result set and fetches candidate profiles with
//! bounded concurrency, pacing and retry.

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod scrapers;
pub mod server;
pub mod session;

pub use config::{JobConfig, JobOverrides, OverloadPolicy, Settings};
pub use error::{ScrapeError, ScrapeResult};
pub use jobs::{Engine, JobLimiter};
pub use models::{
    CandidateView, JobRequest, JobResult, ProfileRecord, RunReport, TerminationReason,
};
pub use session::{ParseError, SessionDescriptor};
