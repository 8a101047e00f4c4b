//! Data types shared across the engine.

mod profile;
mod report;
mod search;

pub use profile::{CandidateView, ProfileRecord};
pub use report::{JobRequest, JobResult, RunReport, TerminationReason};
pub use search::{summaries_from_page, ProfileSummaryRef, SearchContext, DEFAULT_PAGE_SIZE};
