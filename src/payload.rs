//! Synthetic, non-compressible payloads for upload benchmarks.
//!
//! A [`PayloadStream`] yields exactly `limit` bytes drawn from a process-wide
//! random buffer, then signals end-of-stream. Nothing is materialized per
//! instance: each stream owns only two integers (bytes delivered and a
//! rotating offset into the shared buffer).
//!
//! The buffer is filled once, on first use or when [`warm_up`] is called at
//! startup, and is read-only afterwards, so any number of streams can read it
//! concurrently without locking.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use rand::{Rng, RngCore};

/// Size of the shared random buffer (10 MiB).
///
/// Larger buffers repeat less often inside one large upload.
pub const RANDOM_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Maximum size of one block yielded by the [`Stream`] implementation.
const STREAM_BLOCK_SIZE: usize = 64 * 1024;

static RANDOM_BUFFER: LazyLock<Box<[u8]>> = LazyLock::new(|| {
    let mut buffer = vec![0u8; RANDOM_BUFFER_SIZE].into_boxed_slice();
    rand::thread_rng().fill_bytes(&mut buffer);
    buffer
});

/// Forces initialization of the shared random buffer.
///
/// Call before timing anything so the first transfer does not pay for
/// filling 10 MiB of random bytes.
pub fn warm_up() {
    LazyLock::force(&RANDOM_BUFFER);
}

fn shared_buffer() -> &'static [u8] {
    &RANDOM_BUFFER
}

/// A virtual byte source of fixed length.
///
/// Implements [`Read`] for chunked uploads and [`Stream`] of [`Bytes`] so it
/// can be handed to `reqwest::Body::wrap_stream` for simple uploads. Blocks
/// yielded by the stream borrow the static buffer, so no bytes are copied.
#[derive(Debug, Clone)]
pub struct PayloadStream {
    limit: u64,
    delivered: u64,
    offset: usize,
}

impl PayloadStream {
    /// Creates a stream of `limit` bytes starting at a random buffer offset.
    ///
    /// Concurrent instances start at different offsets so servers that
    /// deduplicate identical content cannot coalesce them.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        let offset = rand::thread_rng().gen_range(0..RANDOM_BUFFER_SIZE);
        Self::with_offset(limit, offset)
    }

    /// Creates a stream of `limit` bytes starting at `offset` in the shared buffer.
    #[must_use]
    pub fn with_offset(limit: u64, offset: usize) -> Self {
        Self {
            limit,
            delivered: 0,
            offset: offset % RANDOM_BUFFER_SIZE,
        }
    }

    /// Total number of bytes this stream yields.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Number of bytes handed out so far.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Number of bytes still to come.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.limit - self.delivered
    }

    /// Returns the next contiguous slice of the shared buffer, at most `max` long.
    fn next_block(&mut self, max: usize) -> &'static [u8] {
        let buffer = shared_buffer();
        let remaining = usize::try_from(self.remaining()).unwrap_or(usize::MAX);
        let len = max.min(remaining).min(buffer.len() - self.offset);
        let block = &buffer[self.offset..self.offset + len];
        self.offset = (self.offset + len) % buffer.len();
        self.delivered += len as u64;
        block
    }
}

impl Read for PayloadStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut copied = 0;
        while copied < buf.len() && self.remaining() > 0 {
            let block = self.next_block(buf.len() - copied);
            buf[copied..copied + block.len()].copy_from_slice(block);
            copied += block.len();
        }
        Ok(copied)
    }
}

impl Stream for PayloadStream {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.remaining() == 0 {
            return Poll::Ready(None);
        }
        let block = this.next_block(STREAM_BLOCK_SIZE);
        Poll::Ready(Some(Ok(Bytes::from_static(block))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let blocks = usize::try_from(self.remaining().div_ceil(STREAM_BLOCK_SIZE as u64))
            .unwrap_or(usize::MAX);
        (blocks, None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    #[test]
    fn test_read_yields_exactly_limit_bytes() {
        let mut stream = PayloadStream::new(100_000);
        let mut buf = vec![0u8; 4096];
        let mut total = 0;
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, 100_000);
        assert_eq!(stream.delivered(), 100_000);
        assert_eq!(stream.read(&mut buf).unwrap(), 0, "reads past the end return 0");
    }

    #[test]
    fn test_zero_limit_is_immediately_exhausted() {
        let mut stream = PayloadStream::new(0);
        let mut buf = [0u8; 16];
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_wraps_around_buffer_end() {
        let mut stream = PayloadStream::with_offset(64, RANDOM_BUFFER_SIZE - 16);
        let mut buf = vec![0u8; 64];
        assert_eq!(stream.read(&mut buf).unwrap(), 64);

        let shared = shared_buffer();
        assert_eq!(&buf[..16], &shared[RANDOM_BUFFER_SIZE - 16..]);
        assert_eq!(&buf[16..], &shared[..48]);
    }

    #[test]
    fn test_instances_at_different_offsets_differ() {
        let mut a = PayloadStream::with_offset(4096, 0);
        let mut b = PayloadStream::with_offset(4096, 8192);
        let mut buf_a = vec![0u8; 4096];
        let mut buf_b = vec![0u8; 4096];
        a.read(&mut buf_a).unwrap();
        b.read(&mut buf_b).unwrap();
        assert_ne!(buf_a, buf_b);
    }

    #[test]
    fn test_payload_is_not_trivially_compressible() {
        let mut stream = PayloadStream::with_offset(65_536, 0);
        let mut buf = vec![0u8; 65_536];
        stream.read(&mut buf).unwrap();

        let mut histogram = [0usize; 256];
        for byte in &buf {
            histogram[usize::from(*byte)] += 1;
        }
        let distinct = histogram.iter().filter(|count| **count > 0).count();
        assert!(distinct > 250, "only {distinct} distinct byte values");
        let max = histogram.iter().copied().max().unwrap();
        assert!(max < 65_536 / 64, "byte distribution is skewed: max bucket {max}");
    }

    #[tokio::test]
    async fn test_stream_yields_exactly_limit_bytes() {
        let limit = 3 * STREAM_BLOCK_SIZE as u64 + 17;
        let stream = PayloadStream::new(limit);
        let blocks: Vec<Bytes> = stream.map(|block| block.unwrap()).collect().await;
        let total: u64 = blocks.iter().map(|b| b.len() as u64).sum();
        assert_eq!(total, limit);
        assert!(blocks.iter().all(|b| b.len() <= STREAM_BLOCK_SIZE));
    }
}
