//! Throughput benchmarks over the WebDAV client.
//!
//! This module provides the [`BenchmarkRunner`] for bounded-concurrency
//! upload/download scenarios and the [`BenchmarkResult`] model they produce.

mod error;
mod result;
mod runner;

pub use error::BenchmarkError;
pub use result::{BYTES_PER_MB, BenchmarkResult, TransferOutcome, throughput_mbps};
pub use runner::{
    BenchmarkRunner, LARGE_FILE_DOWNLOAD, LARGE_FILE_NAME, LARGE_FILE_UPLOAD,
    SMALL_FILES_DOWNLOAD, SMALL_FILES_UPLOAD, ScenarioPhase, unit_path,
};
