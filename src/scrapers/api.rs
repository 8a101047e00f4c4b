//! Request builders for the recruiter search API.

use std::sync::Arc;

use serde_json::{json, Value};

use super::http_client::{transaction_id, ApiRequest};
use crate::models::{ProfileSummaryRef, SearchContext};
use crate::session::SessionDescriptor;

/// Path of the profile detail service under the session's base URL.
const PROFILE_SERVICE_PATH: &str = "cloudgateway-resdex/recruiter-js-profile-services/v0";

/// Builds authenticated requests for one session.
///
/// Every request replays the captured headers and cookie and carries a fresh
/// transaction id.
#[derive(Debug, Clone)]
pub struct RequestFactory {
    session: Arc<SessionDescriptor>,
    user_agent: Option<String>,
}

impl RequestFactory {
    pub fn new(session: Arc<SessionDescriptor>, user_agent: Option<String>) -> Self {
        Self {
            session,
            user_agent,
        }
    }

    pub fn session(&self) -> &SessionDescriptor {
        &self.session
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .session
            .headers
            .iter()
            .map(|(k, v)| {
                let value = match (k.as_str(), &self.user_agent) {
                    ("user-agent", Some(ua)) => ua.clone(),
                    _ => v.clone(),
                };
                (k.clone(), value)
            })
            .collect();
        if let Some(ua) = &self.user_agent {
            if !self.session.headers.contains_key("user-agent") {
                headers.push(("user-agent".to_string(), ua.clone()));
            }
        }
        headers.push(("cookie".to_string(), self.session.auth_cookie.clone()));
        headers.push(("x-transaction-id".to_string(), transaction_id()));
        headers
    }

    /// The captured search request, replayed as-is.
    pub fn search(&self) -> ApiRequest {
        ApiRequest {
            url: self.session.search_url.to_string(),
            headers: self.headers(),
            body: self.session.search_body.clone(),
        }
    }

    /// Page-change endpoint: the search URL with `/search` swapped for
    /// `/pageChange`.
    pub fn page_url(&self) -> String {
        let mut url = self.session.search_url.clone();
        let path = url.path().replace("/search", "/pageChange");
        url.set_path(&path);
        url.to_string()
    }

    /// Request for result page `page_no` (2 and up).
    pub fn page(&self, ctx: &SearchContext, page_no: u32) -> ApiRequest {
        let identity = &self.session.identity;
        ApiRequest {
            url: self.page_url(),
            headers: self.headers(),
            body: json!({
                "pageNo": page_no,
                "miscellaneousInfo": {
                    "companyId": identity.company_id,
                    "rdxUserId": identity.rdx_user_id,
                    "rdxUserName": identity.rdx_user_name,
                    "sid": ctx.search_id,
                    "sidGroupId": ctx.group_id,
                }
            }),
        }
    }

    pub fn profile_url(&self) -> String {
        let identity = &self.session.identity;
        let base = self.session.base_url.as_str().trim_end_matches('/');
        format!(
            "{}/{}/companies/{}/recruiters/{}/{}/jsprofile",
            base,
            PROFILE_SERVICE_PATH,
            identity.company_id,
            identity.rdx_user_id,
            self.session.flavor.detail_segment()
        )
    }

    /// Detail request for one search hit.
    pub fn profile(&self, ctx: &SearchContext, summary: &ProfileSummaryRef) -> ApiRequest {
        let identity = &self.session.identity;
        let flavor = self.session.flavor;
        let requirement = identity
            .requirement_id
            .as_ref()
            .map(|r| Value::String(r.clone()))
            .unwrap_or(Value::Null);

        ApiRequest {
            url: self.profile_url(),
            headers: self.headers(),
            body: json!({
                "uniqId": summary.profile_id,
                "pageName": flavor.page_name(),
                "uname": null,
                "sid": ctx.search_id,
                "requirementId": requirement,
                "requirementGroupId": requirement,
                "jsKey": summary.js_key,
                "miscellaneousInfo": {
                    "companyId": identity.company_id,
                    "rdxUserId": identity.rdx_user_id,
                    "resendOtp": false,
                    "flowName": flavor.flow_name(),
                }
            }),
        }
    }
}
