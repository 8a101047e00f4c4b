//! Scraping engine for the recruiter search API.
//!
//! A job runs one [`search::initiate`] call, then a [`PaginationDriver`]
//! feeding a pool of fetch workers, all reporting to a single
//! [`RunAggregator`].

pub mod aggregator;
pub mod api;
pub mod classifier;
pub mod fetch;
pub mod http_client;
pub mod pacing;
pub mod pagination;
pub mod retry;
pub mod search;

pub use aggregator::{JobEvent, RunAggregator};
pub use api::RequestFactory;
pub use classifier::{
    AttemptOutcome, ClassifierRule, ClassifierSettings, OutcomeKind, ResponseClassifier,
    ResponseShape,
};
pub use fetch::{FetchOutcome, WorkerSettings};
pub use http_client::{
    ApiRequest, ClientOptions, Connector, HttpClient, RawResponse, ReqwestConnector, Transport,
    TransportError,
};
pub use pagination::{Claim, PaginationDriver};
pub use retry::{RetryDecision, RetryPolicy};

use std::sync::Arc;

use crate::models::SearchContext;

/// Read-only state shared by one job's pagination and fetch tasks.
pub struct ScrapeContext {
    pub job_id: String,
    pub transport: Arc<dyn Transport>,
    pub requests: RequestFactory,
    pub classifier: ResponseClassifier,
    pub search: SearchContext,
}
