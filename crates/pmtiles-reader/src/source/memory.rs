//! In-memory source

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use super::{RangeResponse, Source, check_cancelled, check_etag};
use crate::error::ReaderResult;

/// Archive held entirely in memory
///
/// The contents can be swapped with [`MemorySource::replace`], which makes
/// it useful for exercising version tag handling.
#[derive(Debug)]
pub struct MemorySource {
    key: String,
    state: RwLock<(Bytes, Option<String>)>,
}

impl MemorySource {
    /// Wrap `data` under the cache key `key`
    pub fn new(key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            state: RwLock::new((data.into(), None)),
        }
    }

    /// Attach a version tag
    pub fn with_etag(self, etag: impl Into<String>) -> Self {
        self.state.write().1 = Some(etag.into());
        self
    }

    /// Swap in new contents and version tag
    pub fn replace(&self, data: impl Into<Bytes>, etag: Option<String>) {
        *self.state.write() = (data.into(), etag);
    }

    /// Current version tag
    pub fn etag(&self) -> Option<String> {
        self.state.read().1.clone()
    }
}

#[async_trait]
impl Source for MemorySource {
    fn key(&self) -> String {
        self.key.clone()
    }

    async fn get_bytes(
        &self,
        offset: u64,
        length: u64,
        cancel: Option<&CancellationToken>,
        expected_etag: Option<&str>,
    ) -> ReaderResult<RangeResponse> {
        check_cancelled(cancel)?;
        let (data, etag) = self.state.read().clone();
        check_etag(expected_etag, etag.as_deref())?;

        let len = data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(length).min(len) as usize;
        Ok(RangeResponse::new(data.slice(start..end)).with_etag(etag))
    }
}
