//! Error types recorded in benchmark results.

use thiserror::Error;

use crate::webdav::TransferError;

/// A failure recorded against a benchmark scenario.
///
/// Apart from `InvalidParameters`, these never abort a scenario: they are
/// collected into [`BenchmarkResult::errors`](super::BenchmarkResult::errors)
/// while the remaining transfers carry on.
#[derive(Debug, Error)]
pub enum BenchmarkError {
    /// Scenario parameters were rejected before any request was made.
    #[error("invalid parameters: count={count}, size={size}, parallel={parallel}")]
    InvalidParameters {
        /// Requested number of files.
        count: usize,
        /// Requested size of each file in bytes.
        size: u64,
        /// Requested parallelism.
        parallel: usize,
    },

    /// A single transfer failed.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Cancellation stopped the dispatcher before every transfer started.
    #[error("cancelled: {skipped} of {count} transfers were never started")]
    Cancelled {
        /// Transfers that were never dispatched.
        skipped: usize,
        /// Transfers the scenario asked for.
        count: usize,
    },

    /// The admission semaphore was closed while transfers were pending.
    #[error("semaphore closed unexpectedly with {skipped} transfers pending")]
    SemaphoreClosed {
        /// Transfers that were never dispatched.
        skipped: usize,
    },

    /// A worker task panicked or was aborted.
    #[error("transfer task failed: {0}")]
    TaskFailed(String),
}

impl BenchmarkError {
    /// Returns true for errors caused by the caller's cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::Transfer(error) => error.is_cancelled(),
            _ => false,
        }
    }
}
