//! Header and directory caches
//!
//! Two strategies are provided:
//!
//! - [`ResolvedValueCache`] stores finished values only; concurrent misses
//!   for one key each hit the source.
//! - [`SharedFutureCache`] stores in-flight fetches so concurrent callers
//!   share one request, and aborts that request once every caller holding
//!   a cancellation token has given up.
//!
//! Both evict the least recently used entry once more than the configured
//! number of entries are held.

mod interest;
mod key;
mod lru;
mod resolved;
mod shared;

pub use key::CacheKey;
pub use resolved::ResolvedValueCache;
pub use shared::SharedFutureCache;

use async_trait::async_trait;
use pmtiles_formats::{Compression, Directory, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{CacheStrategy, ReaderConfig};
use crate::decompress::Decompressor;
use crate::error::{ReaderError, ReaderResult};
use crate::source::Source;

/// Storage for decoded headers and directories, shared across archives
#[async_trait]
pub trait DirectoryCache: Send + Sync {
    /// Header of the archive behind `source`
    async fn get_header(&self, source: &Arc<dyn Source>) -> ReaderResult<Arc<Header>>;

    /// Directory stored at `offset..offset + length` of the archive
    ///
    /// `header` supplies the version tag the bytes must match and the
    /// compression of the directory.
    async fn get_directory(
        &self,
        source: &Arc<dyn Source>,
        offset: u64,
        length: u64,
        header: &Header,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Arc<Directory>>;

    /// Drop the cached header of `source` and fetch it again
    async fn invalidate(&self, source: &Arc<dyn Source>) -> ReaderResult<()>;

    /// Number of cached entries, in flight or settled
    fn len(&self) -> usize;

    /// Whether the cache holds nothing
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Counters since creation
    fn stats(&self) -> CacheStats;
}

/// Build the cache selected by `config`
pub fn cache_from_config(
    config: &ReaderConfig,
    decompressor: Arc<dyn Decompressor>,
) -> Arc<dyn DirectoryCache> {
    match config.cache_strategy {
        CacheStrategy::SharedFuture => Arc::new(SharedFutureCache::from_config(config, decompressor)),
        CacheStrategy::ResolvedValue => Arc::new(ResolvedValueCache::from_config(config, decompressor)),
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache, including joins of in-flight fetches
    pub hits: u64,
    /// Lookups that started a fetch
    pub misses: u64,
    /// Entries dropped to stay within capacity
    pub evictions: u64,
    /// Shared fetches aborted because every caller cancelled
    pub aborted: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total lookups)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    aborted: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
        }
    }
}

/// A cached header or directory
#[derive(Debug, Clone)]
pub(crate) enum CachedValue {
    Header(Arc<Header>),
    Directory(Arc<Directory>),
}

impl CachedValue {
    pub(crate) fn into_header(self) -> ReaderResult<Arc<Header>> {
        match self {
            Self::Header(header) => Ok(header),
            Self::Directory(_) => Err(ReaderError::InvalidSource(
                "cache entry holds a directory where a header was expected".to_string(),
            )),
        }
    }

    pub(crate) fn into_directory(self) -> ReaderResult<Arc<Directory>> {
        match self {
            Self::Directory(directory) => Ok(directory),
            Self::Header(_) => Err(ReaderError::InvalidSource(
                "cache entry holds a header where a directory was expected".to_string(),
            )),
        }
    }
}

/// Header plus the root directory when it arrived in the same read
pub(crate) struct HeaderFetch {
    pub(crate) header: Header,
    pub(crate) root: Option<Directory>,
}

impl HeaderFetch {
    /// Cache key the prefetched root directory belongs under
    pub(crate) fn root_key(&self, source_key: &str) -> CacheKey {
        CacheKey::directory(
            source_key,
            self.header.etag.as_deref(),
            self.header.root_directory_offset,
            self.header.root_directory_length,
        )
    }
}

/// Read the start of the archive, decoding the header and, if it fits, the root directory
pub(crate) async fn fetch_header(
    source: &dyn Source,
    decompressor: &dyn Decompressor,
    initial_fetch_length: u64,
) -> ReaderResult<HeaderFetch> {
    let response = source.get_bytes(0, initial_fetch_length, None, None).await?;
    let header = Header::from_bytes(&response.data, response.etag.clone())?;

    if header.is_legacy() {
        warn!(
            source = %source.key(),
            version = header.spec_version,
            "legacy archive layout, only header and metadata are readable"
        );
        return Ok(HeaderFetch { header, root: None });
    }

    let root_end = header
        .root_directory_offset
        .saturating_add(header.root_directory_length);
    let root = if header.root_directory_length > 0 && root_end <= response.data.len() as u64 {
        let raw = response
            .data
            .slice(header.root_directory_offset as usize..root_end as usize);
        let bytes = decompressor.decompress(raw, header.internal_compression).await?;
        debug!(source = %source.key(), "root directory prefetched with header");
        Some(Directory::from_bytes(&bytes)?)
    } else {
        None
    };

    Ok(HeaderFetch { header, root })
}

/// Read and decode one directory
pub(crate) async fn fetch_directory(
    source: &dyn Source,
    decompressor: &dyn Decompressor,
    offset: u64,
    length: u64,
    etag: Option<&str>,
    compression: Compression,
    cancel: Option<&CancellationToken>,
) -> ReaderResult<Directory> {
    let response = source.get_bytes(offset, length, cancel, etag).await?;
    let bytes = decompressor.decompress(response.data, compression).await?;
    Ok(Directory::from_bytes(&bytes)?)
}
