//! Full benchmark suite against one server.
//!
//! [`run_suite`] connects, creates a scratch folder, runs the upload and
//! download scenarios in a fixed order, cleans up, and streams progress to a
//! [`Reporter`]. The suite always returns a [`SuiteReport`]; a failure to
//! connect or to create the scratch folder ends the run early with
//! [`SuiteReport::error`] set.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::benchmark::{BenchmarkResult, BenchmarkRunner};
use crate::webdav::WebDavClient;

/// Upper bound for the cleanup DELETE once the scenarios are over.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Receives progress lines and result snapshots from the suite.
///
/// Implementations must be cheap and non-blocking; they are called from the
/// suite's own task between scenarios.
pub trait Reporter: Send + Sync {
    /// A human-readable progress line.
    fn broadcast(&self, message: &str);

    /// A snapshot of the report so far.
    fn send_result(&self, report: &SuiteReport);
}

/// Reporter that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn broadcast(&self, message: &str) {
        info!(target: "davbench::report", "{message}");
    }

    fn send_result(&self, report: &SuiteReport) {
        info!(
            target: "davbench::report",
            server_version = %report.server_version,
            completed = report.completed,
            "result snapshot"
        );
    }
}

/// Shape of one multi-file scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSet {
    /// Number of files.
    pub count: usize,
    /// Size of each file in bytes.
    pub size: u64,
    /// Maximum transfers in flight.
    pub parallel: usize,
}

/// Parameters of a suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteConfig {
    /// Many small files, uploaded in parallel.
    pub small: FileSet,
    /// A few medium files, uploaded one at a time for a clean per-stream figure.
    pub medium: FileSet,
    /// Size of the single large file.
    pub large_size: u64,
    /// Use the chunked protocol for the large file when the server supports it.
    pub chunked: bool,
    /// Leave the scratch folder on the server after the run.
    pub keep_files: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            small: FileSet {
                count: 5,
                size: 512 * 1024,
                parallel: 5,
            },
            medium: FileSet {
                count: 3,
                size: 5 * 1024 * 1024,
                parallel: 1,
            },
            large_size: 256 * 1024 * 1024,
            chunked: true,
            keep_files: false,
        }
    }
}

/// Serializable summary of one scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpeedSummary {
    pub scenario: String,
    pub files: usize,
    pub total_bytes: u64,
    pub duration_ms: u64,
    pub speed_mbps: f64,
    pub errors: Vec<String>,
}

impl SpeedSummary {
    fn labelled(label: &str, result: &BenchmarkResult) -> Self {
        Self {
            scenario: label.to_string(),
            files: result.files,
            total_bytes: result.total_size,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            speed_mbps: result.speed_mbps,
            errors: result.error_messages(),
        }
    }
}

/// Everything the suite measured, in a form ready for JSON output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SuiteReport {
    /// Unix timestamp (seconds) of the start of the run.
    pub generated_at: u64,
    pub target_url: String,
    pub server_version: String,
    /// Whether the large file went through the chunked protocol.
    pub chunked_upload: bool,
    pub small_files: Option<SpeedSummary>,
    pub small_files_down: Option<SpeedSummary>,
    pub medium_files: Option<SpeedSummary>,
    pub medium_files_down: Option<SpeedSummary>,
    pub large_file: Option<SpeedSummary>,
    pub large_file_down: Option<SpeedSummary>,
    /// Why the suite stopped early, if it did.
    pub error: Option<String>,
    /// Set once every step, including cleanup, has run.
    pub completed: bool,
}

impl SuiteReport {
    /// Scenario summaries present so far, in run order.
    pub fn scenarios(&self) -> impl Iterator<Item = &SpeedSummary> {
        [
            &self.small_files,
            &self.small_files_down,
            &self.medium_files,
            &self.medium_files_down,
            &self.large_file,
            &self.large_file_down,
        ]
        .into_iter()
        .flatten()
    }

    /// Total number of transfer errors across all scenarios.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.scenarios().map(|summary| summary.errors.len()).sum()
    }
}

/// Formats a byte count with binary units, e.g. `512.0 KB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let suffix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {suffix}B", bytes as f64 / div as f64)
}

/// Name of the scratch folder for a run started at `now`.
#[must_use]
pub fn test_folder_name(now: SystemTime) -> String {
    let secs = now.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    format!("perf-test-{secs}")
}

/// Runs the full suite and returns the final report.
///
/// Progress lines and intermediate snapshots go to `reporter`; the final
/// snapshot is sent with [`SuiteReport::completed`] set when the run got
/// through cleanup.
#[instrument(skip_all, fields(base_url = %client.base_url()))]
pub async fn run_suite(
    client: WebDavClient,
    config: &SuiteConfig,
    cancel: CancellationToken,
    reporter: &dyn Reporter,
) -> SuiteReport {
    let started = SystemTime::now();
    let mut report = SuiteReport {
        generated_at: started
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs()),
        target_url: client.base_url().to_string(),
        ..SuiteReport::default()
    };

    reporter.broadcast("Connecting to WebDAV server...");
    let caps = match client.capabilities(&cancel).await {
        Ok(caps) => caps,
        Err(e) => {
            reporter.broadcast(&format!("Error: {e}"));
            report.error = Some(format!("Failed to connect to server: {e}"));
            reporter.send_result(&report);
            return report;
        }
    };
    report.server_version = caps.version_string().to_string();
    reporter.broadcast(&format!("Connected! Server version {}", report.server_version));

    let folder = test_folder_name(started);
    reporter.broadcast("Creating test directory...");
    if let Err(e) = client.create_directory(&folder, &cancel).await {
        reporter.broadcast(&format!("Error creating folder: {e}"));
        report.error = Some(format!("Failed to create test folder: {e}"));
        reporter.send_result(&report);
        return report;
    }

    let chunked = config.chunked && caps.supports_chunking();
    if config.chunked && !chunked {
        reporter.broadcast("Server does not advertise chunked uploads; using a single PUT");
    }
    report.chunked_upload = chunked;

    let runner = BenchmarkRunner::new(client.clone(), cancel.clone());
    run_scenarios(&runner, config, &folder, chunked, &mut report, reporter).await;

    if cancel.is_cancelled() {
        reporter.broadcast("Benchmark cancelled.");
        report.error = Some("benchmark cancelled".to_string());
    }

    if config.keep_files {
        reporter.broadcast(&format!("Keeping test files in {folder}"));
    } else {
        reporter.broadcast("Cleaning up test files...");
        cleanup(&client, &folder, reporter).await;
    }

    report.completed = !cancel.is_cancelled();
    reporter.send_result(&report);
    reporter.broadcast("Benchmark finished.");
    report
}

async fn run_scenarios(
    runner: &BenchmarkRunner,
    config: &SuiteConfig,
    folder: &str,
    chunked: bool,
    report: &mut SuiteReport,
    reporter: &dyn Reporter,
) {
    let cancel = runner.cancellation_token();
    let small = config.small;
    let medium = config.medium;

    if cancel.is_cancelled() {
        return;
    }
    let label = format!("Small Files Upload ({} x {})", small.count, format_bytes(small.size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner
        .upload_small_files(folder, "test_small_", small.count, small.size, small.parallel)
        .await;
    report.small_files = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);

    if cancel.is_cancelled() {
        return;
    }
    let label = format!("Small Files Download ({} x {})", small.count, format_bytes(small.size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner
        .download_small_files(folder, "test_small_", small.count, small.parallel)
        .await;
    report.small_files_down = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);

    if cancel.is_cancelled() {
        return;
    }
    let label = format!("Medium Files Upload ({} x {})", medium.count, format_bytes(medium.size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner
        .upload_small_files(folder, "test_medium_", medium.count, medium.size, medium.parallel)
        .await;
    report.medium_files = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);

    if cancel.is_cancelled() {
        return;
    }
    let label = format!("Medium Files Download ({} x {})", medium.count, format_bytes(medium.size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner
        .download_small_files(folder, "test_medium_", medium.count, medium.parallel)
        .await;
    report.medium_files_down = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);

    if cancel.is_cancelled() {
        return;
    }
    let mode = if chunked { "chunked" } else { "single PUT" };
    let label = format!("Large File Upload ({}, {mode})", format_bytes(config.large_size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner
        .upload_large_file(folder, config.large_size, chunked)
        .await;
    report.large_file = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);

    if cancel.is_cancelled() {
        return;
    }
    let label = format!("Large File Download ({})", format_bytes(config.large_size));
    reporter.broadcast(&format!("Starting {label}..."));
    let result = runner.download_large_file(folder).await;
    report.large_file_down = Some(summarize(&label, &result, reporter));
    reporter.send_result(report);
}

/// Broadcasts a scenario's outcome and converts it for the report.
fn summarize(label: &str, result: &BenchmarkResult, reporter: &dyn Reporter) -> SpeedSummary {
    let summary = SpeedSummary::labelled(label, result);
    if !result.is_clean() {
        reporter.broadcast(&format!(
            "{label}: {} error(s), first: {}",
            result.errors.len(),
            summary.errors.first().map_or("", String::as_str)
        ));
    }
    reporter.broadcast(&format!("{label}: {:.2} MB/s", result.speed_mbps));
    summary
}

/// Deletes the scratch folder with a fresh token so cleanup survives a
/// cancelled run.
async fn cleanup(client: &WebDavClient, folder: &str, reporter: &dyn Reporter) {
    let cleanup_token = CancellationToken::new();
    match tokio::time::timeout(CLEANUP_TIMEOUT, client.delete(folder, &cleanup_token)).await {
        Ok(Ok(())) => reporter.broadcast("Cleanup complete."),
        Ok(Err(e)) => {
            warn!(folder, error = %e, "cleanup failed");
            reporter.broadcast(&format!("Warning: Cleanup failed: {e}"));
        }
        Err(_) => {
            cleanup_token.cancel();
            warn!(folder, "cleanup timed out");
            reporter.broadcast("Warning: Cleanup timed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(512 * 1024), "512.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5 GB");
    }

    #[test]
    fn test_folder_name_uses_unix_seconds() {
        let now = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        assert_eq!(test_folder_name(now), "perf-test-1700000000");
    }

    #[test]
    fn test_default_suite_config_matches_reference_run() {
        let config = SuiteConfig::default();
        assert_eq!(config.small.count, 5);
        assert_eq!(config.small.size, 512 * 1024);
        assert_eq!(config.medium.parallel, 1);
        assert_eq!(config.large_size, 256 * 1024 * 1024);
        assert!(config.chunked);
    }

    #[test]
    fn test_tracing_reporter_is_a_reporter() {
        let reporter: &dyn Reporter = &TracingReporter;
        reporter.broadcast("Starting Small Files Upload (5 x 512.0 KB)...");
        reporter.send_result(&SuiteReport::default());
    }

    #[test]
    fn test_report_counts_errors_across_scenarios() {
        let report = SuiteReport {
            small_files: Some(SpeedSummary {
                errors: vec!["a".into(), "b".into()],
                ..SpeedSummary::default()
            }),
            large_file: Some(SpeedSummary {
                errors: vec!["c".into()],
                ..SpeedSummary::default()
            }),
            ..SuiteReport::default()
        };
        assert_eq!(report.scenarios().count(), 2);
        assert_eq!(report.error_count(), 3);
    }
}
