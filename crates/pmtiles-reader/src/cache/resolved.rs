//! Cache of settled values

use async_trait::async_trait;
use parking_lot::Mutex;
use pmtiles_formats::{Directory, Header};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::lru::Lru;
use super::{CacheKey, CacheStats, CachedValue, DirectoryCache, StatsCounters, fetch_directory, fetch_header};
use crate::config::{DEFAULT_INITIAL_FETCH_LENGTH, DEFAULT_MAX_CACHE_ENTRIES, ReaderConfig};
use crate::decompress::{DefaultDecompressor, Decompressor};
use crate::error::ReaderResult;
use crate::source::{Source, check_cancelled};

/// Stores only finished headers and directories
///
/// Concurrent misses for the same key each fetch from the source; the
/// last one to finish wins. Cancellation tokens are handed straight to the
/// source.
pub struct ResolvedValueCache {
    entries: Mutex<Lru<CachedValue>>,
    initial_fetch_length: u64,
    decompressor: Arc<dyn Decompressor>,
    stats: StatsCounters,
}

impl ResolvedValueCache {
    /// Cache holding up to `max_entries` values
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Lru::new(max_entries)),
            initial_fetch_length: DEFAULT_INITIAL_FETCH_LENGTH,
            decompressor: Arc::new(DefaultDecompressor),
            stats: StatsCounters::default(),
        }
    }

    /// Cache sized and tuned by `config`
    pub fn from_config(config: &ReaderConfig, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            entries: Mutex::new(Lru::new(config.max_cache_entries)),
            initial_fetch_length: config.initial_fetch_length,
            decompressor,
            stats: StatsCounters::default(),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CachedValue> {
        let value = self.entries.lock().get(key).cloned();
        if value.is_some() {
            self.stats.hit();
            trace!(%key, "cache hit");
        } else {
            self.stats.miss();
            trace!(%key, "cache miss");
        }
        value
    }

    fn store(&self, key: CacheKey, value: CachedValue) {
        let evicted = self.entries.lock().insert(key, value);
        self.stats.evicted(evicted);
    }
}

impl Default for ResolvedValueCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_ENTRIES)
    }
}

#[async_trait]
impl DirectoryCache for ResolvedValueCache {
    async fn get_header(&self, source: &Arc<dyn Source>) -> ReaderResult<Arc<Header>> {
        let source_key = source.key();
        let key = CacheKey::header(&source_key);
        if let Some(value) = self.lookup(&key) {
            return value.into_header();
        }

        let fetched = fetch_header(source.as_ref(), self.decompressor.as_ref(), self.initial_fetch_length).await?;
        let root_key = fetched.root_key(&source_key);
        let header = Arc::new(fetched.header);
        if let Some(root) = fetched.root {
            self.store(root_key, CachedValue::Directory(Arc::new(root)));
        }
        self.store(key, CachedValue::Header(Arc::clone(&header)));
        Ok(header)
    }

    async fn get_directory(
        &self,
        source: &Arc<dyn Source>,
        offset: u64,
        length: u64,
        header: &Header,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Arc<Directory>> {
        check_cancelled(cancel)?;
        let key = CacheKey::directory(&source.key(), header.etag.as_deref(), offset, length);
        if let Some(value) = self.lookup(&key) {
            return value.into_directory();
        }

        let directory = Arc::new(
            fetch_directory(
                source.as_ref(),
                self.decompressor.as_ref(),
                offset,
                length,
                header.etag.as_deref(),
                header.internal_compression,
                cancel,
            )
            .await?,
        );
        self.store(key, CachedValue::Directory(Arc::clone(&directory)));
        Ok(directory)
    }

    async fn invalidate(&self, source: &Arc<dyn Source>) -> ReaderResult<()> {
        let key = CacheKey::header(&source.key());
        debug!(%key, "invalidating header");
        self.entries.lock().remove(&key);
        self.get_header(source).await.map(|_| ())
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
