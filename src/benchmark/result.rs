//! Result model shared by the runner and its callers.

use std::time::Duration;

use super::BenchmarkError;

/// Bytes per megabyte for throughput figures (binary megabyte).
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Throughput in MB/s, or `0.0` when nothing moved or no time elapsed.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn throughput_mbps(total_bytes: u64, duration: Duration) -> f64 {
    let secs = duration.as_secs_f64();
    if total_bytes == 0 || secs <= 0.0 {
        return 0.0;
    }
    total_bytes as f64 / BYTES_PER_MB / secs
}

/// Outcome of one unit of work (one file transfer).
#[derive(Debug)]
pub struct TransferOutcome {
    /// Time from the first request to the last byte.
    pub elapsed: Duration,
    /// Bytes actually moved.
    pub bytes: u64,
    /// Why the transfer failed, if it did.
    pub error: Option<BenchmarkError>,
}

impl TransferOutcome {
    /// A transfer that completed.
    #[must_use]
    pub fn succeeded(elapsed: Duration, bytes: u64) -> Self {
        Self {
            elapsed,
            bytes,
            error: None,
        }
    }

    /// A transfer that failed after moving `bytes` bytes.
    pub fn failed(elapsed: Duration, bytes: u64, error: impl Into<BenchmarkError>) -> Self {
        Self {
            elapsed,
            bytes,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated metrics of one benchmark scenario.
///
/// A scenario always yields a result, even when every transfer failed.
/// A non-empty `errors` list means partial or complete data loss within the
/// scenario, not that the scenario itself failed.
#[derive(Debug)]
pub struct BenchmarkResult {
    /// Name of the scenario, e.g. `Small Files (Parallel)`.
    pub scenario: String,
    /// Number of files the scenario covered.
    pub files: usize,
    /// Bytes counted towards throughput.
    pub total_size: u64,
    /// Wall-clock time from first dispatch to last completion.
    pub duration: Duration,
    /// `total_size / duration` in MB/s.
    pub speed_mbps: f64,
    /// Errors collected from individual transfers (order not significant).
    pub errors: Vec<BenchmarkError>,
}

impl BenchmarkResult {
    /// Builds a result and derives its throughput.
    pub fn from_measurement(
        scenario: impl Into<String>,
        files: usize,
        total_size: u64,
        duration: Duration,
        errors: Vec<BenchmarkError>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            files,
            total_size,
            duration,
            speed_mbps: throughput_mbps(total_size, duration),
            errors,
        }
    }

    /// A result for a scenario that was rejected before it started.
    pub fn rejected(scenario: impl Into<String>, error: BenchmarkError) -> Self {
        Self::from_measurement(scenario, 0, 0, Duration::ZERO, vec![error])
    }

    /// Returns true when no transfer reported an error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Error messages in display form.
    #[must_use]
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}
