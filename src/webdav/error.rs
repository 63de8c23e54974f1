//! Error types for the WebDAV transfer client.
//!
//! Every variant carries the URL or path it relates to, so an error pulled
//! out of a benchmark result can be read without the surrounding logs.

use thiserror::Error;

/// Errors that can occur while talking to the WebDAV server.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The base URL or a derived URL could not be built.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL string.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error on {url}: {source}")]
    Network {
        /// The URL of the failed request.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout on {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The caller raised the cancellation signal while the request was in flight.
    #[error("cancelled: {url}")]
    Cancelled {
        /// The URL of the aborted request.
        url: String,
    },

    /// Capability discovery or status probe failed (bad credentials, not a
    /// cloud-storage server, malformed response).
    #[error("connection to {url} failed: {reason}")]
    Connection {
        /// The probed endpoint.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// MKCOL returned something other than created / already-exists.
    #[error("failed to create directory {path}: HTTP {status}")]
    Directory {
        /// Remote path of the directory.
        path: String,
        /// The HTTP status code.
        status: u16,
    },

    /// DELETE returned something other than success / not-found.
    #[error("failed to delete {path}: HTTP {status}")]
    Delete {
        /// Remote path that could not be deleted.
        path: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A simple PUT upload was rejected.
    #[error("upload to {url} failed: HTTP {status} - {body}")]
    Transfer {
        /// Target URL of the upload.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// Response body returned by the server.
        body: String,
    },

    /// One chunk of a chunked upload failed; the upload was aborted there.
    #[error("chunk {chunk:05} upload failed: {source}")]
    ChunkUpload {
        /// 1-based chunk sequence number.
        chunk: u32,
        /// Why the chunk failed.
        #[source]
        source: Box<TransferError>,
    },

    /// The finalizing MOVE of a chunked upload was rejected.
    #[error("MOVE failed: HTTP {status} - Dest: {destination} - Body: {body}")]
    Move {
        /// The HTTP status code.
        status: u16,
        /// Absolute destination URL sent in the `Destination` header.
        destination: String,
        /// Response body returned by the server.
        body: String,
    },

    /// A GET download answered with a non-200 status.
    #[error("download of {url} failed: HTTP {status}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Reading the local payload source failed.
    #[error("payload read failed: {source}")]
    Payload {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransferError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps a reqwest error onto `Timeout` or `Network`.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Creates a connection error.
    pub fn connection(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a directory creation error.
    pub fn directory(path: impl Into<String>, status: u16) -> Self {
        Self::Directory {
            path: path.into(),
            status,
        }
    }

    /// Creates a delete error.
    pub fn delete(path: impl Into<String>, status: u16) -> Self {
        Self::Delete {
            path: path.into(),
            status,
        }
    }

    /// Creates a simple-upload error.
    pub fn transfer(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Transfer {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Wraps a failure of chunk number `chunk`.
    pub fn chunk_upload(chunk: u32, source: TransferError) -> Self {
        Self::ChunkUpload {
            chunk,
            source: Box::new(source),
        }
    }

    /// Creates a MOVE error.
    pub fn move_failed(status: u16, destination: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Move {
            status,
            destination: destination.into(),
            body: body.into(),
        }
    }

    /// Creates a download error.
    pub fn download(url: impl Into<String>, status: u16) -> Self {
        Self::Download {
            url: url.into(),
            status,
        }
    }

    /// Returns true when the error stems from the caller's cancellation signal.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled { .. } => true,
            Self::ChunkUpload { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Returns the chunk number for chunked-upload failures.
    #[must_use]
    pub fn failed_chunk(&self) -> Option<u32> {
        match self {
            Self::ChunkUpload { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_display_contains_status_and_body() {
        let error = TransferError::transfer("https://cloud.example.com/f.bin", 507, "quota");
        let msg = error.to_string();
        assert!(msg.contains("507"), "Expected status in: {msg}");
        assert!(msg.contains("quota"), "Expected body in: {msg}");
        assert!(msg.contains("https://cloud.example.com/f.bin"), "Expected URL in: {msg}");
    }

    #[test]
    fn test_chunk_upload_error_identifies_chunk() {
        let inner = TransferError::transfer("https://cloud.example.com/up/00003", 500, "");
        let error = TransferError::chunk_upload(3, inner);
        assert_eq!(error.failed_chunk(), Some(3));
        assert!(error.to_string().contains("chunk 00003"));
    }

    #[test]
    fn test_move_error_display_includes_destination() {
        let error = TransferError::move_failed(
            412,
            "https://cloud.example.com/remote.php/dav/files/u/big.bin",
            "precondition failed",
        );
        let msg = error.to_string();
        assert!(msg.starts_with("MOVE failed: HTTP 412"), "got: {msg}");
        assert!(msg.contains("files/u/big.bin"));
        assert!(msg.contains("precondition failed"));
    }

    #[test]
    fn test_is_cancelled_sees_through_chunk_wrapper() {
        let error = TransferError::chunk_upload(2, TransferError::cancelled("u"));
        assert!(error.is_cancelled());
        assert!(!TransferError::download("u", 404).is_cancelled());
    }

    #[test]
    fn test_directory_and_delete_display() {
        assert_eq!(
            TransferError::directory("perf", 403).to_string(),
            "failed to create directory perf: HTTP 403"
        );
        assert_eq!(
            TransferError::delete("perf", 423).to_string(),
            "failed to delete perf: HTTP 423"
        );
    }
}
