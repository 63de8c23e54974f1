//! WebDAV transfer client for cloud-storage servers.
//!
//! # Features
//!
//! - Capability discovery and status probing
//! - Directory creation and idempotent deletion
//! - Streamed single-PUT uploads of synthetic payloads
//! - Chunked uploads (staging MKCOL, ordered chunk PUTs, finalizing MOVE)
//! - Streamed downloads that release the connection on drop
//! - Prompt cancellation of every in-flight request
//!
//! # Wire layout
//!
//! | Purpose            | URL                                                  |
//! |--------------------|------------------------------------------------------|
//! | capabilities       | `{base}/ocs/v1.php/cloud/capabilities?format=json`   |
//! | files              | `{base}/remote.php/dav/files/{user}/{path}`          |
//! | chunk staging      | `{base}/remote.php/dav/uploads/{user}/{transferID}`  |

mod capabilities;
mod client;
pub mod constants;
mod error;

pub use capabilities::{
    Capabilities, CapabilityData, CapabilityFlags, FileCapabilities, OcsEnvelope, ServerStatus,
    ServerVersion,
};
pub use client::{ClientConfig, DownloadBody, WebDavClient};
pub use error::TransferError;
