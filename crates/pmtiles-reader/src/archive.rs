//! Archive facade

use bytes::Bytes;
use pmtiles_formats::{Header, tile_id_to_zxy, tile_json, zxy_to_tile_id};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{DirectoryCache, SharedFutureCache, cache_from_config};
use crate::config::ReaderConfig;
use crate::decompress::{DefaultDecompressor, Decompressor};
use crate::error::{ReaderError, ReaderResult};
use crate::resolver::TileResolver;
use crate::source::{FileSource, HttpSource, Source, check_cancelled};

/// A tile payload with the caching hints of the response it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileData {
    /// Decompressed tile bytes
    pub data: Bytes,
    /// `Cache-Control` of the source response
    pub cache_control: Option<String>,
    /// `Expires` of the source response
    pub expires: Option<String>,
}

/// Read access to one archive
///
/// Every operation that reads archive bytes checks them against the
/// header's version tag. If the archive changed since the header was read,
/// the cached header is invalidated and the operation retried once.
#[derive(Clone)]
pub struct Archive {
    source: Arc<dyn Source>,
    cache: Arc<dyn DirectoryCache>,
    decompressor: Arc<dyn Decompressor>,
}

impl Archive {
    /// Archive with a private shared-future cache and gzip support
    pub fn new(source: impl Source + 'static) -> Self {
        Self::with_cache(
            Arc::new(source),
            Arc::new(SharedFutureCache::default()),
            Arc::new(DefaultDecompressor),
        )
    }

    /// Archive with the cache strategy and sizes from `config`
    pub fn with_config(source: Arc<dyn Source>, config: &ReaderConfig) -> ReaderResult<Self> {
        config.validate()?;
        let decompressor: Arc<dyn Decompressor> = Arc::new(DefaultDecompressor);
        let cache = cache_from_config(config, Arc::clone(&decompressor));
        Ok(Self::with_cache(source, cache, decompressor))
    }

    /// Archive sharing `cache` with other archives
    pub fn with_cache(
        source: Arc<dyn Source>,
        cache: Arc<dyn DirectoryCache>,
        decompressor: Arc<dyn Decompressor>,
    ) -> Self {
        Self {
            source,
            cache,
            decompressor,
        }
    }

    /// Open a local path or an `http(s)://` URL
    pub fn open(location: &str, config: &ReaderConfig) -> ReaderResult<Self> {
        let source: Arc<dyn Source> = if location.starts_with("http://") || location.starts_with("https://") {
            Arc::new(HttpSource::with_config(location, config)?)
        } else {
            Arc::new(FileSource::new(location))
        };
        Self::with_config(source, config)
    }

    /// Source this archive reads from
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// Cache this archive uses
    pub fn cache(&self) -> &Arc<dyn DirectoryCache> {
        &self.cache
    }

    /// Archive header
    pub async fn header(&self) -> ReaderResult<Arc<Header>> {
        self.with_consistency_retry(|| self.cache.get_header(&self.source))
            .await
    }

    /// Tile at `z/x/y`, or `None` when the archive does not contain it
    ///
    /// Coordinates outside the zoom level's grid, or above the highest
    /// addressable zoom, are reported as `None` as well.
    pub async fn get_tile(
        &self,
        z: u8,
        x: u32,
        y: u32,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Option<TileData>> {
        let tile_id = match zxy_to_tile_id(z, x, y) {
            Ok(id) => id,
            Err(err) if err.is_out_of_range() => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        self.with_consistency_retry(|| self.fetch_tile(tile_id, z, cancel))
            .await
    }

    /// Tile with Hilbert id `tile_id`, or `None` when the archive does not contain it
    pub async fn get_tile_by_id(
        &self,
        tile_id: u64,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Option<TileData>> {
        let zoom = match tile_id_to_zxy(tile_id) {
            Ok(coord) => coord.z,
            Err(err) if err.is_out_of_range() => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        self.with_consistency_retry(|| self.fetch_tile(tile_id, zoom, cancel))
            .await
    }

    /// JSON metadata of the archive
    pub async fn metadata(&self) -> ReaderResult<Value> {
        self.with_consistency_retry(|| self.fetch_metadata()).await
    }

    /// TileJSON 3.0.0 document for tiles served under `base_url`
    pub async fn tile_json(&self, base_url: &str) -> ReaderResult<Value> {
        let header = self.header().await?;
        let metadata = self.metadata().await?;
        Ok(tile_json(&header, &metadata, base_url))
    }

    async fn fetch_tile(
        &self,
        tile_id: u64,
        zoom: u8,
        cancel: Option<&CancellationToken>,
    ) -> ReaderResult<Option<TileData>> {
        check_cancelled(cancel)?;
        let header = self.cache.get_header(&self.source).await?;
        if !header.contains_zoom(zoom) {
            return Ok(None);
        }

        let resolver = TileResolver::new(&self.source, self.cache.as_ref());
        let Some(location) = resolver.locate(&header, tile_id, cancel).await? else {
            return Ok(None);
        };

        check_cancelled(cancel)?;
        let response = self
            .source
            .get_bytes(location.offset, location.length, cancel, header.etag.as_deref())
            .await?;
        let data = self
            .decompressor
            .decompress(response.data, header.tile_compression)
            .await?;

        Ok(Some(TileData {
            data,
            cache_control: response.cache_control,
            expires: response.expires,
        }))
    }

    async fn fetch_metadata(&self) -> ReaderResult<Value> {
        let header = self.cache.get_header(&self.source).await?;
        let response = self
            .source
            .get_bytes(header.metadata_offset, header.metadata_length, None, header.etag.as_deref())
            .await?;
        let bytes = self
            .decompressor
            .decompress(response.data, header.internal_compression)
            .await?;
        if bytes.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_slice(&bytes).map_err(|e| ReaderError::InvalidMetadata(e.to_string()))
    }

    /// Run `op`; on a version tag mismatch refresh the header and run it once more
    async fn with_consistency_retry<'a, T, F, Fut>(&'a self, op: F) -> ReaderResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ReaderResult<T>> + 'a,
    {
        match op().await {
            Err(err) if err.is_etag_mismatch() => {
                warn!(source = %self.source.key(), error = %err, "archive changed, refreshing header");
                self.cache.invalidate(&self.source).await?;
                debug!(source = %self.source.key(), "retrying after invalidation");
                op().await
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("source", &self.source.key())
            .field("cached_entries", &self.cache.len())
            .finish_non_exhaustive()
    }
}
