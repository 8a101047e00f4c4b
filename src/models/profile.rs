//! Candidate profile records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Body keys lifted into typed fields; everything else stays in `metadata`.
const NAME_KEY: &str = "name";
const EMAIL_KEY: &str = "email";
const MOBILE_KEY: &str = "mobile";
const RESUME_KEY: &str = "textCv";

/// One fetched profile.
///
/// Only the contact fields and résumé text are typed; the upstream adds and
/// renames fields often enough that the rest is kept as an open mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub profile_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub resume_text: Option<String>,
    pub metadata: Map<String, Value>,
    pub scraped_at: DateTime<Utc>,
}

fn take_text(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl ProfileRecord {
    /// Build a record from a classified-successful detail body.
    pub fn from_payload(profile_id: &str, payload: Value) -> Self {
        let mut metadata = match payload {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("raw".to_string(), other);
                map
            }
        };

        Self {
            profile_id: profile_id.to_string(),
            name: take_text(&mut metadata, NAME_KEY),
            email: take_text(&mut metadata, EMAIL_KEY),
            mobile: take_text(&mut metadata, MOBILE_KEY),
            resume_text: take_text(&mut metadata, RESUME_KEY),
            metadata,
            scraped_at: Utc::now(),
        }
    }

    /// Non-null metadata value.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key).filter(|v| !v.is_null())
    }

    /// First non-null of several metadata keys.
    fn first_field(&self, keys: &[&str]) -> Option<Value> {
        keys.iter().find_map(|k| self.field(k)).cloned()
    }

    fn education(&self, index: usize, key: &str) -> Option<Value> {
        self.field("educations")?
            .as_array()?
            .get(index)?
            .get(key)
            .filter(|v| !v.is_null())
            .cloned()
    }

    /// Flatten into the recruiter-facing output schema.
    pub fn candidate_view(&self) -> CandidateView {
        let f = |key: &str| self.first_field(&[key]);
        CandidateView {
            profile_id: self.profile_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            gender: f("gender"),
            date_of_birth: self.first_field(&["dateOfBirth", "birthDate"]),
            marital_status: f("maritalStatus"),
            current_location: self.first_field(&["currentLocation", "mailCity"]),
            permanent_address: f("permanentAddress"),
            preferred_locations: f("preferredLocations"),
            current_designation: f("currentDesignation"),
            current_company: f("currentCompany"),
            current_role: f("currentRole"),
            functional_area: f("functionalArea"),
            industry_type: f("industryType"),
            employment_type: f("employmentType"),
            previous_designation: f("previousDesignation"),
            previous_company: f("previousCompany"),
            total_experience: f("totalExperience"),
            current_ctc: f("currentCTC"),
            expected_ctc: f("expectedCTC"),
            notice_period: f("noticePeriod"),
            ug_degree: self.education(0, "degree"),
            ug_specialization: self.education(0, "specialization"),
            ug_institute: self.education(0, "institute"),
            ug_year: self.education(0, "year"),
            pg_degree: self.education(1, "degree"),
            pg_specialization: self.education(1, "specialization"),
            pg_institute: self.education(1, "institute"),
            pg_year: self.education(1, "year"),
            key_skills: self.first_field(&["mergedKeySkill", "keywords"]),
            job_title: f("jobTitle"),
            profile_summary: self.first_field(&["profileSummary", "summary"]),
            profile_views: f("profileViews"),
            profile_downloads: f("profileDownloads"),
            cv_attached: f("cvAttached"),
            text_cv: self.resume_text.clone(),
            profile_last_modified: f("profileLastModified"),
            profile_last_active: f("profileLastActive"),
            scraped_at: self.scraped_at,
        }
    }
}

/// Flat candidate row.
///
/// The first education entry is reported as UG and the second as PG; the
/// upstream does not label them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateView {
    pub profile_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub gender: Option<Value>,
    pub date_of_birth: Option<Value>,
    pub marital_status: Option<Value>,
    pub current_location: Option<Value>,
    pub permanent_address: Option<Value>,
    pub preferred_locations: Option<Value>,
    pub current_designation: Option<Value>,
    pub current_company: Option<Value>,
    pub current_role: Option<Value>,
    pub functional_area: Option<Value>,
    pub industry_type: Option<Value>,
    pub employment_type: Option<Value>,
    pub previous_designation: Option<Value>,
    pub previous_company: Option<Value>,
    pub total_experience: Option<Value>,
    #[serde(rename = "currentCTC")]
    pub current_ctc: Option<Value>,
    #[serde(rename = "expectedCTC")]
    pub expected_ctc: Option<Value>,
    pub notice_period: Option<Value>,
    pub ug_degree: Option<Value>,
    pub ug_specialization: Option<Value>,
    pub ug_institute: Option<Value>,
    pub ug_year: Option<Value>,
    pub pg_degree: Option<Value>,
    pub pg_specialization: Option<Value>,
    pub pg_institute: Option<Value>,
    pub pg_year: Option<Value>,
    pub key_skills: Option<Value>,
    pub job_title: Option<Value>,
    pub profile_summary: Option<Value>,
    pub profile_views: Option<Value>,
    pub profile_downloads: Option<Value>,
    pub cv_attached: Option<Value>,
    pub text_cv: Option<String>,
    pub profile_last_modified: Option<Value>,
    pub profile_last_active: Option<Value>,
    pub scraped_at: DateTime<Utc>,
}
