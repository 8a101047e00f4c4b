//! Search execution state and result references.

use serde::Serialize;
use serde_json::Value;

/// Results per page on the upstream search.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One search hit, enough to request its detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummaryRef {
    /// `dynamicEncryptedUniqueId` of the hit.
    pub profile_id: String,
    /// `dynamicEncryptedJsKey`, required by the detail endpoint.
    pub js_key: Option<String>,
    /// 1-based page the hit came from.
    pub source_page: u32,
}

impl ProfileSummaryRef {
    /// Build a reference from one entry of a page's `tuples` array.
    pub fn from_tuple(tuple: &Value, source_page: u32) -> Option<Self> {
        let profile_id = tuple
            .get("dynamicEncryptedUniqueId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?
            .to_string();
        let js_key = tuple
            .get("dynamicEncryptedJsKey")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        Some(Self {
            profile_id,
            js_key,
            source_page,
        })
    }
}

/// Extract references from a search or page response body.
///
/// Entries without a profile id are dropped.
pub fn summaries_from_page(body: &Value, source_page: u32) -> Vec<ProfileSummaryRef> {
    body.get("tuples")
        .and_then(|t| t.as_array())
        .map(|tuples| {
            tuples
                .iter()
                .filter_map(|t| ProfileSummaryRef::from_tuple(t, source_page))
                .collect()
        })
        .unwrap_or_default()
}

/// Server-side search execution, created once per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    /// `sid` correlating page requests to this search.
    pub search_id: String,
    /// `searchParams.sidGroupId`.
    pub group_id: Option<String>,
    pub total_available: u64,
    pub page_size: usize,
    /// Page 1 hits, returned inline with the search response.
    pub first_page: Vec<ProfileSummaryRef>,
}

impl SearchContext {
    /// Pages needed to cover `count` results.
    pub fn pages_for(&self, count: u64) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        count.div_ceil(self.page_size as u64)
    }
}
