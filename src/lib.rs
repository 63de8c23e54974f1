//! WebDAV Benchmark Core Library
//!
//! This library measures file-transfer throughput against a WebDAV
//! cloud-storage server by driving uploads and downloads of synthetic,
//! non-compressible payloads under controlled concurrency.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`payload`] - Synthetic payload source backed by a shared random buffer
//! - [`webdav`] - WebDAV client (simple and chunked uploads, downloads)
//! - [`benchmark`] - Bounded-concurrency scenario runner and result model
//! - [`workflow`] - Full benchmark suite and the reporting sink interface

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod benchmark;
pub mod payload;
mod user_agent;
pub mod webdav;
pub mod workflow;

// Re-export commonly used types
pub use benchmark::{BenchmarkError, BenchmarkResult, BenchmarkRunner, TransferOutcome};
pub use payload::PayloadStream;
pub use webdav::{ClientConfig, TransferError, WebDavClient};
pub use workflow::{Reporter, SuiteConfig, SuiteReport, run_suite};
