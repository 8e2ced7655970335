//! Byte range sources
//!
//! A [`Source`] serves byte ranges of one archive. Implementations are
//! provided for in-memory buffers, local files and HTTP servers.

mod file;
mod http;
mod memory;

pub use file::FileSource;
pub use http::HttpSource;
pub use memory::MemorySource;

use async_trait::async_trait;
use bytes::Bytes;
use std::future::Future;
use tokio_util::sync::CancellationToken;

use crate::error::{ReaderError, ReaderResult};

/// Bytes returned for one range request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeResponse {
    /// Payload; may be shorter than requested at the end of the archive
    pub data: Bytes,
    /// Version tag of the archive, if the source has one
    pub etag: Option<String>,
    /// `Cache-Control` value to pass on to clients
    pub cache_control: Option<String>,
    /// `Expires` value to pass on to clients
    pub expires: Option<String>,
}

impl RangeResponse {
    /// Response carrying only data
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Attach a version tag
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }
}

/// Random access to the bytes of one archive
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable identity of the archive, used to namespace cache keys
    fn key(&self) -> String;

    /// Read `length` bytes starting at `offset`
    ///
    /// When `expected_etag` is given and the source can tell that the
    /// archive no longer has that version, it must fail with
    /// [`ReaderError::EtagMismatch`]. A fired `cancel` token should abort the
    /// read with [`ReaderError::Cancelled`].
    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
        expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse>;
}

/// Fail early if `cancel` has already fired
pub(crate) fn check_cancelled(cancel: Option<&CancellationToken>) -> ReaderResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ReaderError::Cancelled),
        _ => Ok(()),
    }
}

/// Run `fut` unless `cancel` fires first
pub(crate) async fn cancellable<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> ReaderResult<F::Output> {
    match cancel {
        Some(token) => tokio::select! {
            biased;
            () = token.cancelled() => Err(ReaderError::Cancelled),
            out = fut => Ok(out),
        },
        None => Ok(fut.await),
    }
}

/// Compare the expected version tag with the one the source reports
pub(crate) fn check_etag(expected: Option<&str>, actual: Option<&str>) -> ReaderResult<()> {
    match (expected, actual) {
        (Some(expected), Some(actual)) if expected != actual => Err(ReaderError::EtagMismatch {
            expected: Some(expected.to_string()),
            actual: Some(actual.to_string()),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancellable_passes_through() {
        let token = CancellationToken::new();
        let out = cancellable(Some(&token), async { 7 }).await.unwrap();
        assert_eq!(out, 7);
        assert_eq!(cancellable(None, async { 8 }).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_cancellable_aborts() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(Some(&token), std::future::pending::<()>()).await;
        assert!(matches!(result, Err(ReaderError::Cancelled)));
        assert!(check_cancelled(Some(&token)).is_err());
        assert!(check_cancelled(None).is_ok());
    }

    #[test]
    fn test_check_etag() {
        assert!(check_etag(Some("a"), Some("a")).is_ok());
        assert!(check_etag(None, Some("a")).is_ok());
        assert!(check_etag(Some("a"), None).is_ok());
        assert!(check_etag(Some("a"), Some("b")).unwrap_err().is_etag_mismatch());
    }
}
