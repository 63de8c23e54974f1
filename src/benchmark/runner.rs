//! Concurrent benchmark runner.
//!
//! The [`BenchmarkRunner`] drives many transfers through a bounded worker
//! pool and folds their outcomes into a [`BenchmarkResult`].
//!
//! # Concurrency Model
//!
//! - Each transfer runs in its own Tokio task
//! - A semaphore permit is acquired before spawning each task, so at most
//!   `parallel` transfers are in flight at any instant
//! - Permits are released automatically when a task finishes (RAII)
//! - Errors and byte counts go into channels sized to the unit count; the
//!   aggregation step reads them only after every task has been joined
//!
//! # Example
//!
//! ```no_run
//! use davbench_core::benchmark::BenchmarkRunner;
//! use davbench_core::webdav::{ClientConfig, WebDavClient};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WebDavClient::new(ClientConfig::new("https://cloud.example.com", "alice", "secret"))?;
//! let runner = BenchmarkRunner::new(client, CancellationToken::new());
//! let result = runner.upload_small_files("perf-test", "test_small_", 5, 512 * 1024, 5).await;
//! println!("{}: {:.2} MB/s, {} errors", result.scenario, result.speed_mbps, result.errors.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{BenchmarkError, BenchmarkResult, TransferOutcome};
use crate::payload::PayloadStream;
use crate::webdav::WebDavClient;

/// Scenario name for parallel small-file uploads.
pub const SMALL_FILES_UPLOAD: &str = "Small Files (Parallel)";

/// Scenario name for parallel small-file downloads.
pub const SMALL_FILES_DOWNLOAD: &str = "Small Files Download";

/// Scenario name for the single large-file upload.
pub const LARGE_FILE_UPLOAD: &str = "Large File";

/// Scenario name for the single large-file download.
pub const LARGE_FILE_DOWNLOAD: &str = "Large File Download";

/// Remote name of the file used by the large-file scenarios.
pub const LARGE_FILE_NAME: &str = "test_large.bin";

/// Lifecycle of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioPhase {
    /// Parameters accepted, nothing started.
    Idle,
    /// Spawning transfers as permits become available.
    Dispatching,
    /// Every transfer dispatched; waiting for the stragglers.
    Draining,
    /// All transfers joined and folded into a result.
    Aggregated,
}

impl fmt::Display for ScenarioPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Aggregated => "aggregated",
        };
        f.write_str(label)
    }
}

/// What the worker pool hands back to a scenario.
#[derive(Debug)]
struct PoolOutcome {
    errors: Vec<BenchmarkError>,
    bytes: u64,
    duration: Duration,
}

/// Runs benchmark scenarios against one WebDAV server.
///
/// Holds the authenticated client and the run's cancellation token. Raising
/// the token stops dispatching new transfers and aborts the in-flight ones,
/// which then report a cancellation error.
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    client: WebDavClient,
    cancel: CancellationToken,
}

impl BenchmarkRunner {
    /// Creates a runner around a configured client.
    #[must_use]
    pub fn new(client: WebDavClient, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &WebDavClient {
        &self.client
    }

    /// Returns the cancellation token shared by every transfer.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Uploads `count` files of `size` bytes with at most `parallel` in flight.
    ///
    /// Files are named `<base_path>/<prefix><index>.bin`. `total_size` is
    /// `count * size` whether or not individual uploads failed.
    #[instrument(skip(self))]
    pub async fn upload_small_files(
        &self,
        base_path: &str,
        prefix: &str,
        count: usize,
        size: u64,
        parallel: usize,
    ) -> BenchmarkResult {
        if count == 0 || size == 0 || parallel == 0 {
            return rejected(SMALL_FILES_UPLOAD, count, size, parallel);
        }

        info!(count, size, parallel, "starting small file uploads");
        let pool = self
            .run_pool(count, parallel, |index| {
                let client = self.client.clone();
                let cancel = self.cancel.clone();
                let path = unit_path(base_path, prefix, index);
                async move { upload_unit(&client, &path, size, &cancel).await }
            })
            .await;

        let total_size = (count as u64).saturating_mul(size);
        finish(SMALL_FILES_UPLOAD, count, total_size, pool)
    }

    /// Downloads `count` files previously created by
    /// [`upload_small_files`](Self::upload_small_files) with the same prefix.
    ///
    /// `total_size` is the sum of the bytes actually received.
    #[instrument(skip(self))]
    pub async fn download_small_files(
        &self,
        base_path: &str,
        prefix: &str,
        count: usize,
        parallel: usize,
    ) -> BenchmarkResult {
        if count == 0 || parallel == 0 {
            return rejected(SMALL_FILES_DOWNLOAD, count, 0, parallel);
        }

        info!(count, parallel, "starting small file downloads");
        let pool = self
            .run_pool(count, parallel, |index| {
                let client = self.client.clone();
                let cancel = self.cancel.clone();
                let path = unit_path(base_path, prefix, index);
                async move { download_unit(&client, &path, &cancel).await }
            })
            .await;

        let total_size = pool.bytes;
        finish(SMALL_FILES_DOWNLOAD, count, total_size, pool)
    }

    /// Uploads one file of `size` bytes, chunked or with a single PUT.
    #[instrument(skip(self))]
    pub async fn upload_large_file(
        &self,
        base_path: &str,
        size: u64,
        chunked: bool,
    ) -> BenchmarkResult {
        if size == 0 {
            return rejected(LARGE_FILE_UPLOAD, 1, size, 1);
        }

        let path = join_remote(base_path, LARGE_FILE_NAME);
        let payload = PayloadStream::new(size);
        info!(path = %path, size, chunked, "starting large file upload");

        let start = Instant::now();
        let result = if chunked {
            self.client
                .upload_chunked(&path, payload, size, &self.cancel)
                .await
        } else {
            self.client.upload_simple(&path, payload, &self.cancel).await
        };
        let duration = start.elapsed();

        let errors = match result {
            Ok(_) => Vec::new(),
            Err(error) => {
                warn!(path = %path, error = %error, "large file upload failed");
                vec![BenchmarkError::from(error)]
            }
        };
        finish(
            LARGE_FILE_UPLOAD,
            1,
            size,
            PoolOutcome {
                errors,
                bytes: size,
                duration,
            },
        )
    }

    /// Downloads the file created by [`upload_large_file`](Self::upload_large_file).
    #[instrument(skip(self))]
    pub async fn download_large_file(&self, base_path: &str) -> BenchmarkResult {
        let path = join_remote(base_path, LARGE_FILE_NAME);
        info!(path = %path, "starting large file download");

        let start = Instant::now();
        let outcome = download_unit(&self.client, &path, &self.cancel).await;
        let duration = start.elapsed();

        let bytes = outcome.bytes;
        finish(
            LARGE_FILE_DOWNLOAD,
            1,
            bytes,
            PoolOutcome {
                errors: outcome.error.into_iter().collect(),
                bytes,
                duration,
            },
        )
    }

    /// Runs `count` units with at most `parallel` executing at once.
    ///
    /// Each unit's error (if any) and byte count are written once into
    /// channels sized to `count`; they are read only after every task has
    /// been joined.
    async fn run_pool<F, Fut>(&self, count: usize, parallel: usize, unit: F) -> PoolOutcome
    where
        F: Fn(usize) -> Fut,
        Fut: Future<Output = TransferOutcome> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(parallel));
        let (error_tx, mut error_rx) = mpsc::channel::<BenchmarkError>(count);
        let (bytes_tx, mut bytes_rx) = mpsc::channel::<u64>(count);
        let mut handles = Vec::with_capacity(count);
        let mut dispatch_error = None;

        debug!(phase = %ScenarioPhase::Dispatching, count, parallel, "scenario phase");
        let start = Instant::now();

        for index in 0..count {
            // Cancellation wins over a free permit.
            let permit = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    dispatch_error = Some(BenchmarkError::Cancelled { skipped: count - index, count });
                    None
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        dispatch_error = Some(BenchmarkError::SemaphoreClosed { skipped: count - index });
                        None
                    }
                },
            };
            let Some(permit) = permit else {
                warn!(dispatched = index, count, "stopped dispatching transfers");
                break;
            };

            let transfer = unit(index);
            let error_tx = error_tx.clone();
            let bytes_tx = bytes_tx.clone();
            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                let outcome = transfer.await;

                if bytes_tx.try_send(outcome.bytes).is_err() {
                    debug!(index, "byte channel full; dropping count");
                }
                if let Some(error) = outcome.error
                    && error_tx.try_send(error).is_err()
                {
                    debug!(index, "error channel full; dropping error");
                }
            }));
        }
        drop(error_tx);
        drop(bytes_tx);

        debug!(phase = %ScenarioPhase::Draining, task_count = handles.len(), "scenario phase");
        let mut task_errors = Vec::new();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "transfer task panicked");
                task_errors.push(BenchmarkError::TaskFailed(e.to_string()));
            }
        }
        let duration = start.elapsed();

        let mut errors = Vec::new();
        while let Ok(error) = error_rx.try_recv() {
            errors.push(error);
        }
        errors.extend(task_errors);
        errors.extend(dispatch_error);

        let mut bytes: u64 = 0;
        while let Ok(count) = bytes_rx.try_recv() {
            bytes = bytes.saturating_add(count);
        }

        debug!(phase = %ScenarioPhase::Aggregated, errors = errors.len(), bytes, "scenario phase");
        PoolOutcome {
            errors,
            bytes,
            duration,
        }
    }
}

/// Remote path of unit `index`: `<base>/<prefix><index>.bin`.
#[must_use]
pub fn unit_path(base_path: &str, prefix: &str, index: usize) -> String {
    join_remote(base_path, &format!("{prefix}{index}.bin"))
}

fn join_remote(base_path: &str, name: &str) -> String {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

fn rejected(scenario: &str, count: usize, size: u64, parallel: usize) -> BenchmarkResult {
    warn!(scenario, count, size, parallel, "rejecting scenario parameters");
    BenchmarkResult::rejected(
        scenario,
        BenchmarkError::InvalidParameters {
            count,
            size,
            parallel,
        },
    )
}

fn finish(scenario: &str, files: usize, total_size: u64, pool: PoolOutcome) -> BenchmarkResult {
    let result =
        BenchmarkResult::from_measurement(scenario, files, total_size, pool.duration, pool.errors);
    info!(
        scenario,
        files,
        total_size,
        duration_ms = result.duration.as_millis(),
        speed_mbps = result.speed_mbps,
        errors = result.errors.len(),
        "scenario complete"
    );
    result
}

async fn upload_unit(
    client: &WebDavClient,
    path: &str,
    size: u64,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let start = Instant::now();
    match client
        .upload_simple(path, PayloadStream::new(size), cancel)
        .await
    {
        Ok(_) => {
            debug!(path, bytes = size, "uploaded");
            TransferOutcome::succeeded(start.elapsed(), size)
        }
        Err(error) => {
            warn!(path, error = %error, "upload failed");
            TransferOutcome::failed(start.elapsed(), 0, error)
        }
    }
}

async fn download_unit(
    client: &WebDavClient,
    path: &str,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let start = Instant::now();
    let mut body = match client.download(path, cancel).await {
        Ok(body) => body,
        Err(error) => {
            warn!(path, error = %error, "download failed");
            return TransferOutcome::failed(start.elapsed(), 0, error);
        }
    };

    match body.drain(cancel).await {
        Ok(bytes) => {
            debug!(path, bytes, "downloaded");
            TransferOutcome::succeeded(start.elapsed(), bytes)
        }
        Err(error) => {
            let bytes = body.bytes_received();
            warn!(path, bytes, error = %error, "download stream failed");
            TransferOutcome::failed(start.elapsed(), bytes, error)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::webdav::ClientConfig;

    use super::*;

    fn runner() -> BenchmarkRunner {
        let client =
            WebDavClient::new(ClientConfig::new("http://127.0.0.1:9", "user", "pass")).unwrap();
        BenchmarkRunner::new(client, CancellationToken::new())
    }

    #[test]
    fn test_unit_path_is_deterministic() {
        assert_eq!(unit_path("perf", "test_small_", 3), "perf/test_small_3.bin");
        assert_eq!(unit_path("perf/", "f_", 0), "perf/f_0.bin");
        assert_eq!(unit_path("", "f_", 1), "f_1.bin");
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ScenarioPhase::Idle.to_string(), "idle");
        assert_eq!(ScenarioPhase::Draining.to_string(), "draining");
    }

    #[tokio::test]
    async fn test_invalid_upload_parameters_rejected_without_dispatch() {
        let runner = runner();
        for (count, size, parallel) in [(0, 1024, 1), (2, 0, 1), (2, 1024, 0)] {
            let result = runner
                .upload_small_files("perf", "f_", count, size, parallel)
                .await;
            assert_eq!(result.files, 0);
            assert_eq!(result.errors.len(), 1);
            assert!(matches!(
                result.errors[0],
                BenchmarkError::InvalidParameters { .. }
            ));
        }
    }

    #[tokio::test]
    async fn test_invalid_download_parameters_rejected() {
        let result = runner().download_small_files("perf", "f_", 0, 4).await;
        assert_eq!(result.files, 0);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_parallel_limit() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runner = runner();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pool = runner
            .run_pool(20, 3, |_| {
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    TransferOutcome::succeeded(Duration::from_millis(5), 10)
                }
            })
            .await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.bytes, 200);
        assert!(pool.errors.is_empty());
    }

    #[tokio::test]
    async fn test_pool_collects_every_failure() {
        let runner = runner();
        let pool = runner
            .run_pool(6, 2, |index| async move {
                if index % 2 == 0 {
                    TransferOutcome::failed(
                        Duration::ZERO,
                        0,
                        crate::webdav::TransferError::download("u", 500),
                    )
                } else {
                    TransferOutcome::succeeded(Duration::ZERO, 1)
                }
            })
            .await;
        assert_eq!(pool.errors.len(), 3);
        assert_eq!(pool.bytes, 3);
    }

    #[tokio::test]
    async fn test_pool_stops_dispatching_after_cancel() {
        let runner = runner();
        runner.cancellation_token().cancel();
        let pool = runner
            .run_pool(5, 2, |_| async { TransferOutcome::succeeded(Duration::ZERO, 1) })
            .await;
        assert_eq!(pool.bytes, 0);
        assert_eq!(pool.errors.len(), 1);
        assert!(matches!(
            pool.errors[0],
            BenchmarkError::Cancelled { skipped: 5, count: 5 }
        ));
    }

    #[tokio::test]
    async fn test_pool_records_panicked_task() {
        let runner = runner();
        let pool = runner
            .run_pool(2, 1, |index| async move {
                assert!(index != 1, "injected worker panic");
                TransferOutcome::succeeded(Duration::ZERO, 1)
            })
            .await;
        assert_eq!(pool.bytes, 1);
        assert_eq!(pool.errors.len(), 1);
        assert!(matches!(pool.errors[0], BenchmarkError::TaskFailed(_)));
    }
}
