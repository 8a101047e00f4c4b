//! Response classification.
//!
//! Maps a raw HTTP attempt to one of five outcome kinds using an ordered,
//! configurable rule table. Upstream error markers drift over time, so the
//! markers live in configuration rather than code; the defaults below are a
//! starting point, not a complete catalogue.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http_client::{RawResponse, TransportError};

/// Rule name reported when the upstream rejects the session itself.
pub const SESSION_REJECTED_RULE: &str = "session-rejected";

/// Classification of one HTTP attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    TransientFailure,
    QuotaExhausted,
    Blocked,
    Malformed,
}

impl OutcomeKind {
    /// Only transient failures are worth another attempt.
    pub fn is_retriable(self) -> bool {
        matches!(self, OutcomeKind::TransientFailure)
    }

}

/// Result of classifying one attempt. Only the final outcome per reference
/// is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptOutcome {
    pub kind: OutcomeKind,
    pub retriable: bool,
    pub raw_status: Option<u16>,
    pub message: String,
    /// Name of the table rule that matched, if any.
    pub rule: Option<String>,
    /// Server-requested wait before retrying.
    pub retry_after: Option<Duration>,
}

impl AttemptOutcome {
    fn new(kind: OutcomeKind, raw_status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            retriable: kind.is_retriable(),
            raw_status,
            message: message.into(),
            rule: None,
            retry_after: None,
        }
    }

    fn with_rule(mut self, rule: &str) -> Self {
        self.rule = Some(rule.to_string());
        self
    }

    /// True when the upstream rejected the session credentials.
    pub fn is_session_rejection(&self) -> bool {
        self.rule.as_deref() == Some(SESSION_REJECTED_RULE)
    }
}

/// What a successful body must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Search start: object with a `sid`.
    Search,
    /// Result page: object with a `tuples` array.
    Page,
    /// Profile detail: object with every required field.
    Profile,
}

/// Outcome plus the parsed body when the attempt succeeded.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub outcome: AttemptOutcome,
    pub payload: Option<Value>,
}

/// One entry of the lookup table.
///
/// A rule matches when the status is in `statuses` (or `statuses` is empty)
/// and the body contains one of `markers`, case-insensitively (or `markers`
/// is empty). At least one of the two must be non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRule {
    pub name: String,
    #[serde(default)]
    pub statuses: Vec<u16>,
    #[serde(default)]
    pub markers: Vec<String>,
    pub kind: OutcomeKind,
}

impl ClassifierRule {
    pub fn new(name: &str, statuses: &[u16], markers: &[&str], kind: OutcomeKind) -> Self {
        Self {
            name: name.to_string(),
            statuses: statuses.to_vec(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
            kind,
        }
    }

    /// Reject rules that would match everything or claim success.
    pub fn validate(&self) -> Result<(), String> {
        if self.statuses.is_empty() && self.markers.is_empty() {
            return Err(format!(
                "classifier rule '{}' needs statuses or markers",
                self.name
            ));
        }
        if self.kind == OutcomeKind::Success {
            return Err(format!(
                "classifier rule '{}' cannot classify as SUCCESS",
                self.name
            ));
        }
        Ok(())
    }

    fn matches(&self, status: u16, body_lower: &str) -> bool {
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&status);
        let marker_ok = self.markers.is_empty()
            || self
                .markers
                .iter()
                .any(|m| body_lower.contains(m.as_str()));
        status_ok && marker_ok
    }

    fn lowercased(&self) -> Self {
        Self {
            markers: self.markers.iter().map(|m| m.to_lowercase()).collect(),
            ..self.clone()
        }
    }
}

/// Responses meaning the captured session is no longer accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRejection {
    pub statuses: Vec<u16>,
    pub markers: Vec<String>,
}

impl Default for SessionRejection {
    fn default() -> Self {
        Self {
            statuses: vec![401],
            markers: [
                "session expired",
                "session has expired",
                "invalid session",
                "please login",
                "not logged in",
                "login required",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Built-in rule table, evaluated after any configured rules.
pub fn default_rules() -> Vec<ClassifierRule> {
    vec![
        ClassifierRule::new(
            "quota-markers",
            &[],
            &[
                "quota exhausted",
                "quota exceeded",
                "credits exhausted",
                "insufficient credits",
                "no credits left",
                "view limit",
                "limit exhausted",
                "daily limit",
            ],
            OutcomeKind::QuotaExhausted,
        ),
        ClassifierRule::new("payment-required", &[402], &[], OutcomeKind::QuotaExhausted),
        ClassifierRule::new(
            "challenge-markers",
            &[],
            &[
                "captcha",
                "access denied",
                "unusual traffic",
                "bot detected",
                "request blocked",
                "are you a robot",
            ],
            OutcomeKind::Blocked,
        ),
        ClassifierRule::new("forbidden", &[403], &[], OutcomeKind::Blocked),
        ClassifierRule::new(
            "throttled",
            &[408, 425, 429, 500, 502, 503, 504],
            &[],
            OutcomeKind::TransientFailure,
        ),
    ]
}

/// Classifier configuration as it appears in the settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Extra rules, evaluated before the built-in table.
    pub rules: Vec<ClassifierRule>,
    /// Whether the built-in table applies after `rules`.
    pub use_default_rules: bool,
    pub session_rejection: SessionRejection,
    /// Fields a profile body must contain to count as a record.
    pub profile_required_fields: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            use_default_rules: true,
            session_rejection: SessionRejection::default(),
            profile_required_fields: vec!["name".to_string()],
        }
    }
}

impl ClassifierSettings {
    pub fn validate(&self) -> Result<(), String> {
        for rule in &self.rules {
            rule.validate()?;
        }
        if self.rules.is_empty() && !self.use_default_rules {
            return Err("classifier has no rules".to_string());
        }
        Ok(())
    }
}

/// Stateless response classifier.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    rules: Vec<ClassifierRule>,
    rejection_statuses: Vec<u16>,
    rejection_markers: Vec<String>,
    profile_required_fields: Vec<String>,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(&ClassifierSettings::default())
    }
}

impl ResponseClassifier {
    pub fn new(settings: &ClassifierSettings) -> Self {
        let mut rules: Vec<ClassifierRule> =
            settings.rules.iter().map(ClassifierRule::lowercased).collect();
        if settings.use_default_rules {
            rules.extend(default_rules().iter().map(ClassifierRule::lowercased));
        }

        Self {
            rules,
            rejection_statuses: settings.session_rejection.statuses.clone(),
            rejection_markers: settings
                .session_rejection
                .markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            profile_required_fields: settings.profile_required_fields.clone(),
        }
    }

    /// Classify one attempt. Pure: the same input always yields the same
    /// verdict.
    pub fn classify(
        &self,
        attempt: &Result<RawResponse, TransportError>,
        shape: ResponseShape,
    ) -> Verdict {
        let response = match attempt {
            Ok(r) => r,
            Err(e) => {
                return Verdict {
                    outcome: AttemptOutcome::new(OutcomeKind::TransientFailure, None, e.to_string()),
                    payload: None,
                }
            }
        };

        let status = response.status;
        let success = response.is_success();
        let parsed = if success && !response.body.trim().is_empty() {
            serde_json::from_str::<Value>(&response.body).ok()
        } else {
            None
        };

        // A well-formed success wins before any marker scan: record bodies
        // carry free text that may contain marker words.
        if let Some(ref value) = parsed {
            if self.shape_error(value, shape).is_none() {
                return Verdict {
                    outcome: AttemptOutcome::new(OutcomeKind::Success, Some(status), "ok"),
                    payload: parsed,
                };
            }
        }

        let body_lower = response.body.to_lowercase();

        if self.rejection_statuses.contains(&status)
            || self
                .rejection_markers
                .iter()
                .any(|m| body_lower.contains(m.as_str()))
        {
            return Verdict {
                outcome: AttemptOutcome::new(
                    OutcomeKind::Blocked,
                    Some(status),
                    format!("session rejected (HTTP {})", status),
                )
                .with_rule(SESSION_REJECTED_RULE),
                payload: None,
            };
        }

        if let Some(rule) = self.rules.iter().find(|r| r.matches(status, &body_lower)) {
            let mut outcome = AttemptOutcome::new(
                rule.kind,
                Some(status),
                format!("HTTP {} matched rule '{}'", status, rule.name),
            )
            .with_rule(&rule.name);
            if rule.kind.is_retriable() {
                outcome.retry_after = response.retry_after();
            }
            return Verdict {
                outcome,
                payload: None,
            };
        }

        let outcome = if !success {
            if status >= 500 {
                AttemptOutcome::new(
                    OutcomeKind::TransientFailure,
                    Some(status),
                    format!("HTTP {}", status),
                )
            } else {
                AttemptOutcome::new(
                    OutcomeKind::Malformed,
                    Some(status),
                    format!("HTTP {} rejected the request", status),
                )
            }
        } else {
            match parsed {
                None if response.body.trim().is_empty() => AttemptOutcome::new(
                    OutcomeKind::TransientFailure,
                    Some(status),
                    "empty body",
                ),
                None => AttemptOutcome::new(
                    OutcomeKind::TransientFailure,
                    Some(status),
                    "body is not JSON",
                ),
                Some(ref value) => AttemptOutcome::new(
                    OutcomeKind::Malformed,
                    Some(status),
                    self.shape_error(value, shape)
                        .unwrap_or_else(|| "unexpected body".to_string()),
                ),
            }
        };

        Verdict {
            outcome,
            payload: None,
        }
    }

    fn shape_error(&self, value: &Value, shape: ResponseShape) -> Option<String> {
        let Some(obj) = value.as_object() else {
            return Some("body is not a JSON object".to_string());
        };

        match shape {
            ResponseShape::Search => match obj.get("sid") {
                Some(Value::String(s)) if !s.is_empty() => None,
                Some(Value::Number(_)) => None,
                _ => Some("search response has no sid".to_string()),
            },
            // A page must carry `tuples`; null only counts alongside the
            // search fields, otherwise error bodies would read as empty pages.
            ResponseShape::Page => match obj.get("tuples") {
                Some(Value::Array(_)) => None,
                Some(Value::Null) if obj.contains_key("sid") || obj.contains_key("totalResumes") => {
                    None
                }
                None | Some(Value::Null) => Some("page response has no tuples".to_string()),
                Some(_) => Some("page tuples is not an array".to_string()),
            },
            ResponseShape::Profile => self
                .profile_required_fields
                .iter()
                .find(|f| !obj.contains_key(f.as_str()))
                .map(|f| format!("profile lacks field '{}'", f)),
        }
    }
}
