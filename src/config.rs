//! Configuration for resdex-scrape.
//!
//! Resolution order: built-in defaults, then an optional settings file
//! (TOML or JSON by extension), then `RESDEX_*` environment variables. Jobs
//! may override a subset per submission; the result is frozen into a
//! [`JobConfig`] before the job starts.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::ScrapeError;
use crate::models::JobRequest;
use crate::scrapers::classifier::{ClassifierSettings, ResponseClassifier};
use crate::scrapers::http_client::{resolve_user_agent, DEFAULT_USER_AGENT};
use crate::scrapers::retry::RetryPolicy;

/// Env var naming the settings file when `--config` is not given.
pub const CONFIG_ENV: &str = "RESDEX_CONFIG";

/// What to do with a job submitted while all job slots are busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverloadPolicy {
    /// Wait for a slot.
    #[default]
    Queue,
    /// Fail immediately with `Overloaded`.
    Reject,
}

/// Pacing, retry and pool sizing for scrape jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Delay between result pages.
    pub page_delay_ms: u64,
    /// Delay before every profile attempt, per worker.
    pub profile_delay_ms: u64,
    /// Retries for a transient profile failure.
    pub max_retries: u32,
    /// Retries for a transient page failure before the run stops.
    pub page_retries: u32,
    /// Base of the exponential retry backoff.
    pub retry_backoff_ms: u64,
    /// Profile fetch workers per job.
    pub workers: usize,
    /// Largest worker pool a job may ask for.
    pub max_workers: usize,
    /// Largest `targetCount` a job may ask for.
    pub max_target_count: usize,
    /// Concurrent jobs per process.
    pub max_jobs: usize,
    pub overload: OverloadPolicy,
    pub request_timeout_secs: u64,
    /// Wall-clock limit per job; the job ends as CANCELLED when hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
    /// Results per upstream page.
    pub page_size: usize,
    /// User agent override: unset keeps the captured one, `"impersonate"`
    /// picks a real browser agent, anything else is sent verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            page_delay_ms: 2000,
            profile_delay_ms: 3000,
            max_retries: 2,
            page_retries: 2,
            retry_backoff_ms: 1000,
            workers: 5,
            max_workers: 50,
            max_target_count: 10_000,
            max_jobs: 10,
            overload: OverloadPolicy::Queue,
            request_timeout_secs: 30,
            job_timeout_secs: None,
            page_size: crate::models::DEFAULT_PAGE_SIZE,
            user_agent: None,
        }
    }
}

/// How captures are turned into session descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Headers added when the capture lacks them.
    pub default_headers: BTreeMap<String, String>,
    /// Headers that must be present after defaults are applied.
    pub required_headers: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let default_headers = [
            ("accept", "application/json"),
            ("accept-language", "en-US,en;q=0.9"),
            ("appid", "112"),
            ("content-type", "application/json"),
            ("origin", "https://resdex.naukri.com"),
            ("systemid", "naukriIndia"),
            ("user-agent", DEFAULT_USER_AGENT),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            default_headers,
            required_headers: Vec::new(),
        }
    }
}

/// HTTP adapter bind address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub session: SessionSettings,
    pub classifier: ClassifierSettings,
    pub server: ServerSettings,
    /// File the settings were read from, if any.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Settings {
    /// Load settings: defaults, then `path` (or `$RESDEX_CONFIG`), then env.
    pub fn load(path: Option<&Path>) -> Result<Self, ScrapeError> {
        let env_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let settings = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::load_from_path(&p)?,
            None => Self::default(),
        };

        let settings = settings.with_env_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Read a settings file. The format follows the extension (`.json` is
    /// JSON, anything else TOML).
    pub fn load_from_path(path: &Path) -> Result<Self, ScrapeError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ScrapeError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut settings: Settings = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| ScrapeError::Config(format!("failed to parse JSON config: {}", e)))?,
            _ => toml::from_str(&contents)
                .map_err(|e| ScrapeError::Config(format!("failed to parse TOML config: {}", e)))?,
        };

        settings.source_path = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Apply `RESDEX_*` overrides. Unparseable values are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        let engine = &mut self.engine;
        if let Some(v) = parsed(&lookup, "RESDEX_PAGE_DELAY_MS") {
            engine.page_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_PROFILE_DELAY_MS") {
            engine.profile_delay_ms = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_MAX_RETRIES") {
            engine.max_retries = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_WORKERS") {
            engine.workers = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_MAX_WORKERS") {
            engine.max_workers = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_MAX_TARGET_COUNT") {
            engine.max_target_count = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_MAX_JOBS") {
            engine.max_jobs = v;
        }
        if let Some(v) = parsed(&lookup, "RESDEX_REQUEST_TIMEOUT_SECS") {
            engine.request_timeout_secs = v;
        }
        if let Some(v) = parsed::<u64>(&lookup, "RESDEX_JOB_TIMEOUT_SECS") {
            // Zero clears a timeout set in the file.
            engine.job_timeout_secs = (v > 0).then_some(v);
        }
        self
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        let engine = &self.engine;
        if engine.workers == 0 {
            return Err(ScrapeError::Config("workers must be at least 1".into()));
        }
        if engine.workers > engine.max_workers {
            return Err(ScrapeError::Config(format!(
                "workers ({}) exceeds max_workers ({})",
                engine.workers, engine.max_workers
            )));
        }
        if engine.max_target_count == 0 || engine.max_target_count > Semaphore::MAX_PERMITS {
            return Err(ScrapeError::Config(format!(
                "max_target_count must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if engine.max_jobs == 0 {
            return Err(ScrapeError::Config("max_jobs must be at least 1".into()));
        }
        if engine.page_size == 0 {
            return Err(ScrapeError::Config("page_size must be at least 1".into()));
        }
        if engine.request_timeout_secs == 0 {
            return Err(ScrapeError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        self.classifier.validate().map_err(ScrapeError::Config)?;
        Ok(())
    }

    /// Check a submission against the request rules and the configured
    /// limits.
    pub fn check_request(&self, request: &JobRequest) -> Result<(), ScrapeError> {
        request.validate()?;
        if request.target_count > self.engine.max_target_count {
            return Err(ScrapeError::InvalidRequest(format!(
                "targetCount {} exceeds the limit of {}",
                request.target_count, self.engine.max_target_count
            )));
        }
        Ok(())
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ScrapeError> {
        toml::to_string_pretty(self).map_err(|e| ScrapeError::Config(e.to_string()))
    }

    /// Freeze settings plus per-job overrides into a job's configuration.
    pub fn job_config(&self, overrides: &JobOverrides) -> Result<JobConfig, ScrapeError> {
        let engine = &self.engine;
        let workers = overrides.workers.unwrap_or(engine.workers);
        if workers == 0 {
            return Err(ScrapeError::InvalidRequest(
                "worker count must be at least 1".into(),
            ));
        }
        if workers > engine.max_workers {
            return Err(ScrapeError::InvalidRequest(format!(
                "worker count {} exceeds the limit of {}",
                workers, engine.max_workers
            )));
        }
        let backoff = Duration::from_millis(engine.retry_backoff_ms);

        Ok(JobConfig {
            page_delay: Duration::from_millis(overrides.page_delay_ms.unwrap_or(engine.page_delay_ms)),
            profile_delay: Duration::from_millis(
                overrides.profile_delay_ms.unwrap_or(engine.profile_delay_ms),
            ),
            profile_retry: RetryPolicy::new(
                overrides.max_retries.unwrap_or(engine.max_retries),
                backoff,
            ),
            page_retry: RetryPolicy::new(engine.page_retries, backoff),
            workers,
            request_timeout: Duration::from_secs(engine.request_timeout_secs),
            job_timeout: engine.job_timeout_secs.map(Duration::from_secs),
            proxy: overrides.proxy.clone(),
            page_size: engine.page_size,
            user_agent: resolve_user_agent(engine.user_agent.as_deref()),
            session: self.session.clone(),
            classifier: ResponseClassifier::new(&self.classifier),
        })
    }
}

/// Settings a single job may override.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOverrides {
    pub workers: Option<usize>,
    pub proxy: Option<String>,
    pub page_delay_ms: Option<u64>,
    pub profile_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

/// Immutable configuration of one job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub page_delay: Duration,
    pub profile_delay: Duration,
    pub profile_retry: RetryPolicy,
    pub page_retry: RetryPolicy,
    pub workers: usize,
    pub request_timeout: Duration,
    pub job_timeout: Option<Duration>,
    pub proxy: Option<String>,
    pub page_size: usize,
    /// Replaces the captured user agent when set.
    pub user_agent: Option<String>,
    pub session: SessionSettings,
    pub classifier: ResponseClassifier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.engine.page_delay_ms, 2000);
        assert_eq!(settings.engine.profile_delay_ms, 3000);
        assert_eq!(settings.engine.max_retries, 2);
        assert_eq!(settings.engine.max_jobs, 10);
        assert_eq!(settings.engine.overload, OverloadPolicy::Queue);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::default().with_env_overrides(env(&[
            ("RESDEX_PAGE_DELAY_MS", "10"),
            ("RESDEX_WORKERS", "3"),
            ("RESDEX_MAX_RETRIES", "not a number"),
            ("RESDEX_JOB_TIMEOUT_SECS", "90"),
        ]));
        assert_eq!(settings.engine.page_delay_ms, 10);
        assert_eq!(settings.engine.workers, 3);
        assert_eq!(settings.engine.max_retries, 2);
        assert_eq!(settings.engine.job_timeout_secs, Some(90));

        let cleared = settings.with_env_overrides(env(&[("RESDEX_JOB_TIMEOUT_SECS", "0")]));
        assert_eq!(cleared.engine.job_timeout_secs, None);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
workers = 2
overload = "reject"

[[classifier.rules]]
name = "maintenance"
markers = ["under maintenance"]
kind = "TRANSIENT_FAILURE"
"#
        )
        .unwrap();

        let settings = Settings::load_from_path(file.path()).unwrap();
        assert_eq!(settings.engine.workers, 2);
        assert_eq!(settings.engine.page_delay_ms, 2000);
        assert_eq!(settings.engine.overload, OverloadPolicy::Reject);
        assert_eq!(settings.classifier.rules.len(), 1);
        assert!(settings.classifier.use_default_rules);
        assert_eq!(settings.source_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"engine": {{"max_jobs": 4}}}}"#).unwrap();
        let settings = Settings::load_from_path(file.path()).unwrap();
        assert_eq!(settings.engine.max_jobs, 4);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "engine = [").unwrap();
        assert!(matches!(
            Settings::load_from_path(file.path()),
            Err(ScrapeError::Config(_))
        ));
        assert!(matches!(
            Settings::load_from_path(Path::new("/nonexistent/resdex.toml")),
            Err(ScrapeError::Config(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_pools() {
        let mut settings = Settings::default();
        settings.engine.workers = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.engine.max_jobs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.classifier.use_default_rules = false;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_job_config_overrides() {
        let settings = Settings::default();
        let config = settings
            .job_config(&JobOverrides {
                workers: Some(7),
                proxy: Some("socks5://127.0.0.1:9050".into()),
                profile_delay_ms: Some(0),
                max_retries: Some(4),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(config.workers, 7);
        assert_eq!(config.page_delay, Duration::from_secs(2));
        assert_eq!(config.profile_delay, Duration::ZERO);
        assert_eq!(config.profile_retry.max_retries, 4);
        assert_eq!(config.page_retry.max_retries, 2);
        assert_eq!(config.proxy.as_deref(), Some("socks5://127.0.0.1:9050"));
        assert_eq!(config.user_agent, None);

        let zero = JobOverrides {
            workers: Some(0),
            ..Default::default()
        };
        assert!(settings.job_config(&zero).is_err());
    }

    #[test]
    fn test_to_toml_round_trips_engine() {
        let toml = Settings::default().to_toml().unwrap();
        assert!(toml.contains("[engine]"));
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.engine, EngineSettings::default());
    }

    #[test]
    fn test_job_limits() {
        let settings = Settings::default();
        let over = JobOverrides {
            workers: Some(settings.engine.max_workers + 1),
            ..Default::default()
        };
        assert!(matches!(
            settings.job_config(&over),
            Err(ScrapeError::InvalidRequest(_))
        ));

        assert!(settings.check_request(&JobRequest::new("curl x", 10_000)).is_ok());
        assert!(matches!(
            settings.check_request(&JobRequest::new("curl x", 10_001)),
            Err(ScrapeError::InvalidRequest(_))
        ));
        assert!(settings.check_request(&JobRequest::new("curl x", usize::MAX)).is_err());

        let mut settings = Settings::default();
        settings.engine.workers = 60;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.engine.max_target_count = usize::MAX;
        assert!(settings.validate().is_err());
    }

}
