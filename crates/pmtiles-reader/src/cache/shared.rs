//! Cache of shared in-flight fetches

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use parking_lot::Mutex;
use pmtiles_formats::{Directory, Header};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::interest::Interest;
use super::lru::Lru;
use super::{CacheKey, CacheStats, CachedValue, DirectoryCache, StatsCounters, fetch_directory, fetch_header};
use crate::config::{DEFAULT_INITIAL_FETCH_LENGTH, DEFAULT_MAX_CACHE_ENTRIES, ReaderConfig};
use crate::decompress::{DefaultDecompressor, Decompressor};
use crate::error::{ReaderError, ReaderResult};
use crate::source::{Source, check_cancelled};

type SharedFetch = Shared<BoxFuture<'static, ReaderResult<CachedValue>>>;

struct Slot {
    id: u64,
    fetch: SharedFetch,
    interest: Arc<Interest>,
}

impl Slot {
    fn ready(id: u64, value: CachedValue) -> Self {
        let fetch: SharedFetch = future::ready(Ok(value)).boxed().shared();
        // drive it once so later joins see a settled value
        let _ = fetch.clone().now_or_never();
        Self {
            id,
            fetch,
            interest: Arc::new(Interest::settled()),
        }
    }
}

type Slots = Mutex<Lru<Slot>>;

/// Caches fetches while they are still in flight
///
/// Concurrent requests for one header or directory share a single source
/// read. Callers that pass a cancellation token may abandon the wait; the
/// read itself is aborted only when every such caller has abandoned it and
/// no caller without a token ever joined. An aborted entry is removed so
/// the next request starts afresh. Failed reads are removed once they
/// settle; callers already waiting still see the failure.
pub struct SharedFutureCache {
    slots: Arc<Slots>,
    invalidations: Mutex<HashMap<String, SharedFetch>>,
    next_id: Arc<AtomicU64>,
    initial_fetch_length: u64,
    decompressor: Arc<dyn Decompressor>,
    stats: Arc<StatsCounters>,
}

impl SharedFutureCache {
    /// Cache holding up to `max_entries` values or in-flight fetches
    pub fn new(max_entries: usize) -> Self {
        Self::build(max_entries, DEFAULT_INITIAL_FETCH_LENGTH, Arc::new(DefaultDecompressor))
    }

    /// Cache sized and tuned by `config`
    pub fn from_config(config: &ReaderConfig, decompressor: Arc<dyn Decompressor>) -> Self {
        Self::build(config.max_cache_entries, config.initial_fetch_length, decompressor)
    }

    fn build(max_entries: usize, initial_fetch_length: u64, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            slots: Arc::new(Mutex::new(Lru::new(max_entries))),
            invalidations: Mutex::new(HashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
            initial_fetch_length,
            decompressor,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    /// Join the fetch for `key`, starting it with `start` if none is usable
    fn join<F>(&self, key: &CacheKey, cancellable: bool, start: F) -> Waiter
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, ReaderResult<CachedValue>>,
    {
        let mut slots = self.slots.lock();

        if let Some(slot) = slots.get(key)
            && !slot.interest.is_aborted()
        {
            self.stats.hit();
            trace!(%key, "joining cached fetch");
            slot.interest.attach(cancellable);
            return self.waiter(key, slot.id, slot.fetch.clone(), &slot.interest, cancellable);
        }

        self.stats.miss();
        trace!(%key, "starting fetch");
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let interest = Arc::new(Interest::new());
        let work = start(interest.fetch_token());
        let fetch = self.track(key.clone(), id, Arc::clone(&interest), work);
        interest.attach(cancellable);

        let waiter = self.waiter(key, id, fetch.clone(), &interest, cancellable);
        let evicted = slots.insert(key.clone(), Slot {
            id,
            fetch,
            interest,
        });
        self.stats.evicted(evicted);
        waiter
    }

    fn waiter(
        &self,
        key: &CacheKey,
        id: u64,
        fetch: SharedFetch,
        interest: &Arc<Interest>,
        cancellable: bool,
    ) -> Waiter {
        let departure = cancellable.then(|| Departure {
            slots: Arc::downgrade(&self.slots),
            stats: Arc::clone(&self.stats),
            interest: Arc::clone(interest),
            key: key.clone(),
            id,
        });
        Waiter { fetch, departure }
    }

    /// Wrap `work` so it stops on abort and drops its entry on failure
    fn track(
        &self,
        key: CacheKey,
        id: u64,
        interest: Arc<Interest>,
        work: BoxFuture<'static, ReaderResult<CachedValue>>,
    ) -> SharedFetch {
        let token = interest.fetch_token();
        let slots = Arc::downgrade(&self.slots);
        async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => Err(ReaderError::Cancelled),
                result = work => result,
            };
            interest.settle();

            if let Err(err) = &result {
                debug!(%key, error = %err, "fetch failed, dropping cache entry");
                if let Some(slots) = slots.upgrade() {
                    slots.lock().remove_if(&key, |slot| slot.id == id);
                }
            }
            result
        }
        .boxed()
        .shared()
    }

    fn join_header(&self, source: &Arc<dyn Source>) -> Waiter {
        let source_key = source.key();
        let key = CacheKey::header(&source_key);

        let source = Arc::clone(source);
        let decompressor = Arc::clone(&self.decompressor);
        let initial_fetch_length = self.initial_fetch_length;
        let slots = Arc::downgrade(&self.slots);
        let next_id = Arc::clone(&self.next_id);
        let stats = Arc::clone(&self.stats);

        self.join(&key, false, move |_| {
            async move {
                let fetched = fetch_header(source.as_ref(), decompressor.as_ref(), initial_fetch_length).await?;
                let root_key = fetched.root_key(&source_key);
                let header = Arc::new(fetched.header);

                if let Some(root) = fetched.root
                    && let Some(slots) = slots.upgrade()
                {
                    let mut slots = slots.lock();
                    if !slots.contains(&root_key) {
                        trace!(key = %root_key, "seeding prefetched root directory");
                        let id = next_id.fetch_add(1, Ordering::Relaxed);
                        let evicted = slots.insert(root_key, Slot::ready(id, CachedValue::Directory(Arc::new(root))));
                        stats.evicted(evicted);
                    }
                }

                Ok(CachedValue::Header(header))
            }
            .boxed()
        })
    }
}

impl Default for SharedFutureCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_ENTRIES)
    }
}

/// One caller's attachment to a shared fetch
struct Waiter {
    fetch: SharedFetch,
    departure: Option<Departure>,
}

impl Waiter {
    async fn wait(self, cancel: Option<&CancellationToken>) -> ReaderResult<CachedValue> {
        let Self { fetch, departure } = self;
        let result = match cancel {
            Some(token) => tokio::select! {
                biased;
                result = fetch => result,
                () = token.cancelled() => Err(ReaderError::Cancelled),
            },
            None => fetch.await,
        };
        drop(departure);
        result
    }
}

/// Releases a cancellable caller's interest when it stops waiting, however it stops
struct Departure {
    slots: Weak<Slots>,
    stats: Arc<StatsCounters>,
    interest: Arc<Interest>,
    key: CacheKey,
    id: u64,
}

impl Drop for Departure {
    fn drop(&mut self) {
        let Some(slots) = self.slots.upgrade() else {
            self.interest.release();
            return;
        };
        // hold the slot lock so no new caller can join between abort and removal
        let mut slots = slots.lock();
        if self.interest.release() {
            slots.remove_if(&self.key, |slot| slot.id == self.id);
            self.stats.abort();
            debug!(key = %self.key, "every caller cancelled, fetch aborted");
        }
    }
}

/// Clears a caller's invalidation entry when it stops waiting, however it stops
struct PendingInvalidation<'a> {
    invalidations: &'a Mutex<HashMap<String, SharedFetch>>,
    source_key: String,
    fetch: SharedFetch,
}

impl Drop for PendingInvalidation<'_> {
    fn drop(&mut self) {
        let mut pending = self.invalidations.lock();
        if pending.get(&self.source_key).is_some_and(|f| f.ptr_eq(&self.fetch)) {
            pending.remove(&self.source_key);
        }
    }
}

#[async_trait]
impl DirectoryCache for SharedFutureCache {
    async fn get_header(&self, source: &Arc<dyn Source>) -> ReaderResult<Arc<Header>> {
        self.join_header(source).wait(None).await?.into_header()
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

        let source = Arc::clone(source);
        let decompressor = Arc::clone(&self.decompressor);
        let etag = header.etag.clone();
        let compression = header.internal_compression;

        let waiter = self.join(&key, cancel.is_some(), move |token| {
            async move {
                let directory = fetch_directory(
                    source.as_ref(),
                    decompressor.as_ref(),
                    offset,
                    length,
                    etag.as_deref(),
                    compression,
                    Some(&token),
                )
                .await?;
                Ok(CachedValue::Directory(Arc::new(directory)))
            }
            .boxed()
        });

        waiter.wait(cancel).await?.into_directory()
    }

    async fn invalidate(&self, source: &Arc<dyn Source>) -> ReaderResult<()> {
        let source_key = source.key();
        let pending = {
            let mut pending = self.invalidations.lock();
            let fetch = if let Some(existing) = pending.get(&source_key) {
                trace!(source = %source_key, "joining pending invalidation");
                existing.clone()
            } else {
                debug!(source = %source_key, "invalidating header");
                self.slots.lock().remove(&CacheKey::header(&source_key));
                let fetch = self.join_header(source).fetch;
                pending.insert(source_key.clone(), fetch.clone());
                fetch
            };
            PendingInvalidation {
                invalidations: &self.invalidations,
                source_key,
                fetch,
            }
        };

        let result = pending.fetch.clone().await;
        drop(pending);
        result.map(|_| ())
    }

    fn len(&self) -> usize {
        self.slots.lock().len()
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
