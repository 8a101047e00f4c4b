//! Scrape command.

use std::path::PathBuf;

use console::style;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use resdex_scrape::{Engine, JobRequest, JobResult, Settings};

use crate::cli::helpers::{arrow, error, read_capture, success, write_output};

/// Shape of the JSON written for a finished job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Full job result with raw profile records
    #[default]
    Records,
    /// Flattened candidate rows
    Candidates,
}

pub struct ScrapeArgs {
    pub capture: String,
    pub target: usize,
    pub workers: Option<usize>,
    pub proxy: Option<String>,
    pub page_delay_ms: Option<u64>,
    pub profile_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Run one job in the foreground. Ctrl+C cancels it and still prints the
/// partial result.
pub async fn cmd_scrape(settings: Settings, args: ScrapeArgs) -> anyhow::Result<()> {
    let raw = read_capture(&args.capture)?;
    let request = JobRequest {
        concurrency: args.workers,
        proxy_endpoint: args.proxy,
        page_delay_ms: args.page_delay_ms,
        profile_delay_ms: args.profile_delay_ms,
        max_retries: args.max_retries,
        ..JobRequest::new(raw, args.target)
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Interrupted, stopping job...", style("!").yellow());
            interrupt.cancel();
        }
    });

    eprintln!("{} Scraping up to {} profiles", arrow(), args.target);
    let engine = Engine::new(settings);
    let result = engine.submit(request, cancel).await;

    let rendered = render(&result, args.format)?;
    write_output(args.output.as_deref(), &rendered)?;
    print_summary(&result);

    if !result.success {
        anyhow::bail!(
            "job {} ended with {}",
            result.job_id,
            result.termination_reason
        );
    }
    Ok(())
}

fn render(result: &JobResult, format: OutputFormat) -> anyhow::Result<String> {
    let value = match format {
        OutputFormat::Records => serde_json::to_value(result)?,
        OutputFormat::Candidates => candidates_document(result)?,
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn candidates_document(result: &JobResult) -> anyhow::Result<Value> {
    let candidates = result
        .fetched_records
        .iter()
        .map(|r| serde_json::to_value(r.candidate_view()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "success": result.success,
        "jobId": result.job_id,
        "totalCandidates": candidates.len(),
        "scrapedAt": result.scraped_at,
        "terminationReason": result.termination_reason,
        "failedCount": result.failed_count,
        "elapsedSeconds": result.elapsed_seconds,
        "error": result.error,
        "candidates": candidates,
    }))
}

fn print_summary(result: &JobResult) {
    let icon = if result.success { success() } else { error() };
    eprintln!(
        "{} {} - {} fetched, {} failed, {} pages in {:.1}s",
        icon,
        style(result.termination_reason).bold(),
        result.total_fetched,
        result.failed_count,
        result.pages_fetched,
        result.elapsed_seconds
    );
    if let Some(total) = result.total_available {
        eprintln!("  {} {} results available upstream", style("→").dim(), total);
    }
    if let Some(ref message) = result.error {
        eprintln!("  {} {}", style("→").dim(), message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resdex_scrape::{ProfileRecord, TerminationReason};

    fn result() -> JobResult {
        JobResult {
            success: true,
            job_id: "job-1".into(),
            fetched_records: vec![ProfileRecord::from_payload(
                "u1",
                json!({"name": "Asha", "mailCity": "Pune"}),
            )],
            total_fetched: 1,
            failed_count: 0,
            termination_reason: TerminationReason::TargetReached,
            elapsed_seconds: 1.5,
            error: None,
            error_kind: None,
            total_available: Some(10),
            pages_fetched: 1,
            scraped_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_candidates_format() {
        let doc: Value = serde_json::from_str(&render(&result(), OutputFormat::Candidates).unwrap()).unwrap();
        assert_eq!(doc["totalCandidates"], 1);
        assert_eq!(doc["candidates"][0]["name"], "Asha");
        assert_eq!(doc["candidates"][0]["currentLocation"], "Pune");
        assert_eq!(doc["terminationReason"], "TARGET_REACHED");
    }

    #[test]
    fn test_records_format() {
        let doc: Value = serde_json::from_str(&render(&result(), OutputFormat::Records).unwrap()).unwrap();
        assert_eq!(doc["fetchedRecords"][0]["profileId"], "u1");
        assert_eq!(doc["totalFetched"], 1);
    }
}
