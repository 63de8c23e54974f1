//! Constants for the WebDAV client (timeouts, chunking, wire names).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default whole-request timeout (5 minutes for large simple uploads).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the finalizing MOVE of a chunked upload.
///
/// The server assembles every chunk before answering, which can take
/// minutes for large files.
pub const MOVE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default chunk size for chunked uploads (25 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 25 * 1024 * 1024;

/// Width of the zero-padded chunk sequence name (`00001`).
pub const CHUNK_NAME_WIDTH: usize = 5;

/// Header carrying the assembled file size on the finalizing MOVE.
pub const TOTAL_LENGTH_HEADER: &str = "OC-Total-Length";

/// Header required by the OCS API.
pub const OCS_API_HEADER: &str = "OCS-APIRequest";

/// Virtual entry inside a staging collection that represents the assembled file.
pub const ASSEMBLED_ENTRY: &str = ".file";
