//! WebDAV client for cloud-storage servers.
//!
//! This module provides the [`WebDavClient`] which speaks the subset of
//! WebDAV needed for throughput benchmarks: capability discovery, directory
//! management, simple and chunked uploads, and streamed downloads.
//!
//! Every operation takes a [`CancellationToken`]. Raising it drops the
//! in-flight request future, which aborts the underlying connection instead
//! of waiting for the server to answer.

use std::io::Read;
use std::sync::LazyLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use reqwest::header::{ACCEPT, CONTENT_LENGTH};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use url::Url;

use super::capabilities::{Capabilities, ServerStatus};
use super::constants::{
    ASSEMBLED_ENTRY, CHUNK_NAME_WIDTH, CONNECT_TIMEOUT, DEFAULT_CHUNK_SIZE, MOVE_TIMEOUT,
    OCS_API_HEADER, REQUEST_TIMEOUT, TOTAL_LENGTH_HEADER,
};
use super::error::TransferError;
use crate::payload::PayloadStream;
use crate::user_agent;

#[allow(clippy::expect_used)]
static MKCOL: LazyLock<Method> =
    LazyLock::new(|| Method::from_bytes(b"MKCOL").expect("MKCOL is a valid method token"));

#[allow(clippy::expect_used)]
static MOVE: LazyLock<Method> =
    LazyLock::new(|| Method::from_bytes(b"MOVE").expect("MOVE is a valid method token"));

/// Connection settings for a [`WebDavClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root, e.g. `https://cloud.example.com` (a webroot path is allowed).
    pub base_url: String,
    /// Account name; also the user segment of every DAV path.
    pub username: String,
    /// Password or app token for HTTP Basic authentication.
    pub password: String,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Whole-request timeout for everything except the finalizing MOVE.
    pub request_timeout: Duration,
    /// Timeout for the finalizing MOVE of a chunked upload.
    pub move_timeout: Duration,
    /// Chunk size for chunked uploads, in bytes.
    pub chunk_size: usize,
}

impl ClientConfig {
    /// Creates a configuration with default timeouts and chunk size.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            move_timeout: MOVE_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Overrides the chunk size used by chunked uploads.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Overrides the connect and request timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    /// Overrides the MOVE timeout.
    #[must_use]
    pub fn with_move_timeout(mut self, move_timeout: Duration) -> Self {
        self.move_timeout = move_timeout;
        self
    }
}

/// Authenticated WebDAV client.
///
/// Cheap to clone: clones share the underlying connection pool, so one
/// client can be handed to every benchmark worker.
///
/// # Example
///
/// ```no_run
/// use davbench_core::webdav::{ClientConfig, WebDavClient};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = WebDavClient::new(ClientConfig::new("https://cloud.example.com", "alice", "secret"))?;
/// let cancel = CancellationToken::new();
/// let caps = client.capabilities(&cancel).await?;
/// println!("server version {}", caps.version_string());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
    move_timeout: Duration,
    chunk_size: usize,
}

/// A streamed GET response body.
///
/// The connection is released when the value is dropped, whether or not the
/// body was read to the end.
#[derive(Debug)]
pub struct DownloadBody {
    url: String,
    response: Response,
    received: u64,
}

impl DownloadBody {
    /// Content length announced by the server, if any.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.response.content_length()
    }

    /// Bytes read from the body so far.
    #[must_use]
    pub fn bytes_received(&self) -> u64 {
        self.received
    }

    /// Reads and discards the rest of the body, returning the total byte count.
    ///
    /// On error, [`bytes_received`](Self::bytes_received) still reports what
    /// arrived before the failure.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Cancelled`] when `cancel` fires and
    /// `Network`/`Timeout` when the stream breaks.
    pub async fn drain(&mut self, cancel: &CancellationToken) -> Result<u64, TransferError> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(TransferError::cancelled(self.url.as_str())),
                chunk = self.response.chunk() => chunk,
            };
            match next.map_err(|e| TransferError::from_reqwest(self.url.as_str(), e))? {
                Some(chunk) => self.received += chunk.len() as u64,
                None => return Ok(self.received),
            }
        }
    }
}

impl WebDavClient {
    /// Creates a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] if the base URL cannot be parsed
    /// and [`TransferError::Connection`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(config), fields(base_url = %config.base_url, user = %config.username))]
    pub fn new(config: ClientConfig) -> Result<Self, TransferError> {
        let trimmed = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| TransferError::invalid_url(config.base_url.clone()))?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .http1_only()
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| TransferError::connection(base_url.as_str(), e.to_string()))?;

        debug!(chunk_size = config.chunk_size, "created WebDAV client");

        Ok(Self {
            client,
            base_url,
            username: config.username,
            password: config.password,
            move_timeout: config.move_timeout,
            chunk_size: config.chunk_size.max(1),
        })
    }

    /// Returns the account name used for authentication.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the configured chunk size for chunked uploads.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the server root URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `{base}/remote.php/dav/files/{user}/{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] if the base URL cannot carry a path.
    pub fn file_url(&self, path: &str) -> Result<Url, TransferError> {
        let prefix = ["remote.php", "dav", "files", self.username.as_str()];
        let rest = path.split('/').filter(|segment| !segment.is_empty());
        with_segments(&self.base_url, prefix.into_iter().chain(rest))
    }

    /// Builds `{base}/remote.php/dav/uploads/{user}/{transfer_id}`.
    fn staging_url(&self, transfer_id: &str) -> Result<Url, TransferError> {
        with_segments(
            &self.base_url,
            ["remote.php", "dav", "uploads", self.username.as_str(), transfer_id],
        )
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        self.client
            .request(method, url.clone())
            .basic_auth(&self.username, Some(&self.password))
    }

    /// Sends a request, racing it against the cancellation token.
    async fn send(
        &self,
        request: RequestBuilder,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Response, TransferError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(TransferError::cancelled(url.as_str())),
            result = request.send() => result.map_err(|e| TransferError::from_reqwest(url.as_str(), e)),
        }
    }

    /// Fetches the server's capability document.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Connection`] on a non-2xx answer or a body
    /// without `ocs.data.version.string`.
    #[instrument(skip(self, cancel))]
    pub async fn capabilities(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Capabilities, TransferError> {
        let mut url = with_segments(&self.base_url, ["ocs", "v1.php", "cloud", "capabilities"])?;
        url.set_query(Some("format=json"));

        let request = self
            .request(Method::GET, &url)
            .header(OCS_API_HEADER, "true")
            .header(ACCEPT, "application/json");
        let response = self.send(request, &url, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::connection(
                url.as_str(),
                format!("API returned status: {status}"),
            ));
        }

        let body = read_text(response, &url, cancel).await?;
        let caps: Capabilities = serde_json::from_str(&body).map_err(|e| {
            TransferError::connection(url.as_str(), format!("failed to parse capabilities: {e}"))
        })?;

        info!(version = %caps.version_string(), chunking = caps.supports_chunking(), "capabilities discovered");
        Ok(caps)
    }

    /// Fetches the unauthenticated installation status from `/status.php`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Connection`] on a non-200 answer or malformed body.
    #[instrument(skip(self, cancel))]
    pub async fn status(&self, cancel: &CancellationToken) -> Result<ServerStatus, TransferError> {
        let url = with_segments(&self.base_url, ["status.php"])?;
        let response = self.send(self.client.get(url.clone()), &url, cancel).await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransferError::connection(
                url.as_str(),
                format!("status.php returned: {status}"),
            ));
        }

        let body = read_text(response, &url, cancel).await?;
        serde_json::from_str(&body).map_err(|e| {
            TransferError::connection(url.as_str(), format!("failed to parse status.php: {e}"))
        })
    }

    /// Creates a directory with MKCOL. An existing directory counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Directory`] for any other non-2xx answer.
    #[instrument(skip(self, cancel))]
    pub async fn create_directory(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        let url = self.file_url(path)?;
        let response = self
            .send(self.request(MKCOL.clone(), &url), &url, cancel)
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::METHOD_NOT_ALLOWED {
            debug!(status = status.as_u16(), "directory ready");
            return Ok(());
        }
        Err(TransferError::directory(path, status.as_u16()))
    }

    /// Deletes a file or directory. A missing path counts as success.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Delete`] for any other non-2xx answer.
    #[instrument(skip(self, cancel))]
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<(), TransferError> {
        let url = self.file_url(path)?;
        let response = self
            .send(self.request(Method::DELETE, &url), &url, cancel)
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(status = status.as_u16(), "path removed");
            return Ok(());
        }
        Err(TransferError::delete(path, status.as_u16()))
    }

    /// Uploads `payload` with a single streamed PUT.
    ///
    /// `Content-Length` is the payload's limit; the body is streamed from the
    /// payload source and never buffered as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Transfer`] with status and response body on a
    /// non-2xx answer, or a network/cancellation error.
    #[instrument(skip(self, payload, cancel), fields(size = payload.limit()))]
    pub async fn upload_simple(
        &self,
        path: &str,
        payload: PayloadStream,
        cancel: &CancellationToken,
    ) -> Result<Duration, TransferError> {
        let url = self.file_url(path)?;
        let size = payload.limit();
        let start = Instant::now();

        debug!(url = %url, size, "PUT simple");
        let request = self
            .request(Method::PUT, &url)
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(payload));
        let response = self.send(request, &url, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(TransferError::transfer(url.as_str(), status.as_u16(), body));
        }

        Ok(start.elapsed())
    }

    /// Uploads `source` with the chunked-upload protocol.
    ///
    /// 1. MKCOL a staging collection named by a fresh transfer ID.
    /// 2. PUT the source in chunk-size pieces to `<staging>/00001`,
    ///    `<staging>/00002`, ... strictly one after another. A short read
    ///    marks the final chunk.
    /// 3. MOVE `<staging>/.file` onto the destination, announcing
    ///    `total_size` so the server can validate the assembly.
    ///
    /// A failure leaves the staging collection behind; servers expire
    /// abandoned uploads on their own.
    ///
    /// # Errors
    ///
    /// - [`TransferError::Directory`] if the staging collection cannot be created.
    /// - [`TransferError::ChunkUpload`] naming the failed chunk; no MOVE is sent.
    /// - [`TransferError::Move`] if the server rejects the assembly.
    #[instrument(skip(self, source, cancel))]
    pub async fn upload_chunked<R: Read + Send>(
        &self,
        path: &str,
        mut source: R,
        total_size: u64,
        cancel: &CancellationToken,
    ) -> Result<Duration, TransferError> {
        let transfer_id = new_transfer_id();
        let staging = self.staging_url(&transfer_id)?;
        let destination = self.file_url(path)?;
        let start = Instant::now();

        info!(staging = %staging, "MKCOL staging collection");
        let response = self
            .send(self.request(MKCOL.clone(), &staging), &staging, cancel)
            .await?;
        if !response.status().is_success() {
            return Err(TransferError::directory(
                staging.as_str(),
                response.status().as_u16(),
            ));
        }

        let mut chunk_number: u32 = 0;
        loop {
            let chunk = read_chunk(&mut source, self.chunk_size)
                .map_err(|source| TransferError::Payload { source })?;
            if chunk.is_empty() {
                break;
            }
            let is_last = chunk.len() < self.chunk_size;
            chunk_number += 1;

            let chunk_name = format!("{chunk_number:0width$}", width = CHUNK_NAME_WIDTH);
            let chunk_url = with_segments(&staging, [chunk_name.as_str()])?;
            debug!(chunk = chunk_number, bytes = chunk.len(), "uploading chunk");

            let request = self.request(Method::PUT, &chunk_url).body(chunk);
            let response = self
                .send(request, &chunk_url, cancel)
                .await
                .map_err(|e| TransferError::chunk_upload(chunk_number, e))?;

            let status = response.status();
            if !status.is_success() {
                let body = error_body(response).await;
                return Err(TransferError::chunk_upload(
                    chunk_number,
                    TransferError::transfer(chunk_url.as_str(), status.as_u16(), body),
                ));
            }

            if is_last {
                break;
            }
        }

        let move_source = with_segments(&staging, [ASSEMBLED_ENTRY])?;
        info!(from = %move_source, to = %destination, chunks = chunk_number, "MOVE assembled upload");

        let request = self
            .request(MOVE.clone(), &move_source)
            .header("Destination", destination.as_str())
            .header("Overwrite", "T")
            .header(TOTAL_LENGTH_HEADER, total_size)
            .timeout(self.move_timeout);
        let response = self.send(request, &move_source, cancel).await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(TransferError::move_failed(
                status.as_u16(),
                destination.as_str(),
                body,
            ));
        }

        Ok(start.elapsed())
    }

    /// Starts a GET download and returns the streamed body.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Download`] on any status other than 200.
    #[instrument(skip(self, cancel))]
    pub async fn download(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<DownloadBody, TransferError> {
        let url = self.file_url(path)?;
        debug!(url = %url, "GET");
        let response = self
            .send(self.request(Method::GET, &url), &url, cancel)
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransferError::download(url.as_str(), status.as_u16()));
        }

        Ok(DownloadBody {
            url: url.into(),
            response,
            received: 0,
        })
    }
}

/// Appends path segments to a copy of `base`, percent-encoding each one.
fn with_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, TransferError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| TransferError::invalid_url(base.as_str()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Transfer ID for a staging collection: Unix milliseconds plus a random suffix.
fn new_transfer_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis());
    let suffix: u32 = rand::thread_rng().r#gen();
    format!("{millis}-{suffix:08x}")
}

/// Reads up to `size` bytes, looping over short reads until the source is
/// exhausted or the chunk is full.
fn read_chunk<R: Read>(source: &mut R, size: usize) -> std::io::Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(size);
    source.take(size as u64).read_to_end(&mut chunk)?;
    Ok(chunk)
}

async fn read_text(
    response: Response,
    url: &Url,
    cancel: &CancellationToken,
) -> Result<String, TransferError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(TransferError::cancelled(url.as_str())),
        text = response.text() => text.map_err(|e| TransferError::from_reqwest(url.as_str(), e)),
    }
}

/// Best-effort read of an error response body for diagnostics.
async fn error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> WebDavClient {
        WebDavClient::new(ClientConfig::new(base, "alice", "secret")).unwrap()
    }

    #[test]
    fn test_file_url_layout() {
        let url = client("https://cloud.example.com")
            .file_url("perf-test-1/test_small_0.bin")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/dav/files/alice/perf-test-1/test_small_0.bin"
        );
    }

    #[test]
    fn test_file_url_keeps_webroot_and_ignores_extra_slashes() {
        let url = client("https://example.com/nextcloud/")
            .file_url("/dir//file.bin")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/nextcloud/remote.php/dav/files/alice/dir/file.bin"
        );
    }

    #[test]
    fn test_file_url_percent_encodes_segments() {
        let url = client("https://cloud.example.com").file_url("my dir/a#b.bin").unwrap();
        assert!(url.as_str().ends_with("/files/alice/my%20dir/a%23b.bin"), "got {url}");
    }

    #[test]
    fn test_staging_url_layout() {
        let url = client("https://cloud.example.com").staging_url("123-abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://cloud.example.com/remote.php/dav/uploads/alice/123-abc"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = WebDavClient::new(ClientConfig::new("not a url", "u", "p"));
        assert!(matches!(result, Err(TransferError::InvalidUrl { .. })));
    }

    #[test]
    fn test_transfer_ids_are_unique() {
        let ids: std::collections::HashSet<String> = (0..100).map(|_| new_transfer_id()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn test_read_chunk_fills_across_short_reads() {
        struct Trickle(usize);
        impl Read for Trickle {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = buf.len().min(3).min(self.0);
                self.0 -= n;
                Ok(n)
            }
        }

        let mut source = Trickle(10);
        assert_eq!(read_chunk(&mut source, 4).unwrap().len(), 4);
        assert_eq!(read_chunk(&mut source, 4).unwrap().len(), 4);
        assert_eq!(read_chunk(&mut source, 4).unwrap().len(), 2);
        assert!(read_chunk(&mut source, 4).unwrap().is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("https://c", "u", "p");
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.move_timeout, MOVE_TIMEOUT);
        assert!(config.move_timeout > config.request_timeout);
    }
}
