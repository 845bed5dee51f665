//! In-memory FIFO image cache with request de-duplication.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared, join_all};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::domain::entities::LoadedImage;
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{ImageCachePort, ImageFetcherPort, PreloadOutcome};

/// Default maximum number of images to cache in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

type SharedLoad = Shared<BoxFuture<'static, LoadResult<LoadedImage>>>;

/// Everything behind the lock. Cache lookup, in-flight lookup and in-flight
/// registration happen under one guard so two callers can never both start
/// a load for the same URL.
struct CacheState {
    /// Only touched through non-promoting calls, so recency order is
    /// insertion order and the LRU end is the oldest insertion.
    entries: LruCache<String, LoadedImage>,
    in_flight: HashMap<String, SharedLoad>,
    /// Bumped by `clear`; loads from an older generation are discarded.
    generation: u64,
}

impl CacheState {
    /// Inserts or replaces in place. Returns the evicted URL, if any.
    fn insert(&mut self, url: &str, image: LoadedImage) -> Option<String> {
        if let Some(slot) = self.entries.peek_mut(url) {
            *slot = image;
            return None;
        }
        self.entries
            .push(url.to_string(), image)
            .map(|(evicted, _)| evicted)
    }
}

enum Lookup {
    Hit(LoadedImage),
    Pending(SharedLoad),
}

/// In-memory cache of decoded images keyed by final request URL.
///
/// Eviction is strict FIFO: reading an entry never refreshes it.
pub struct MemoryImageCache {
    state: Arc<Mutex<CacheState>>,
    fetcher: Arc<dyn ImageFetcherPort>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryImageCache {
    /// Creates a new cache with the specified capacity.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcherPort>, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: LruCache::new(cap),
                in_flight: HashMap::new(),
                generation: 0,
            })),
            fetcher,
            capacity: cap.get(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a new cache with the default capacity.
    #[must_use]
    pub fn with_default_capacity(fetcher: Arc<dyn ImageFetcherPort>) -> Self {
        Self::new(fetcher, DEFAULT_CACHE_CAPACITY)
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of loads currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let state = self.state.lock();
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: state.entries.len(),
            in_flight: state.in_flight.len(),
            capacity: self.capacity,
        }
    }

    fn lookup_or_start(&self, url: &str) -> Lookup {
        let mut state = self.state.lock();

        if let Some(image) = state.entries.peek(url) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(url = %url, "Memory cache hit");
            return Lookup::Hit(image.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        if let Some(pending) = state.in_flight.get(url) {
            trace!(url = %url, "Joining in-flight load");
            return Lookup::Pending(pending.clone());
        }

        let load = self.spawn_load(url.to_string(), state.generation);
        state.in_flight.insert(url.to_string(), load.clone());
        Lookup::Pending(load)
    }

    /// Runs the fetch on its own task so it completes even if every waiter
    /// goes away; waiters share the task's result.
    fn spawn_load(&self, url: String, generation: u64) -> SharedLoad {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        debug!(url = %url, "Starting image load");

        let task = tokio::spawn(async move {
            let result = fetcher.fetch(&url).await;

            {
                let mut state = state.lock();
                if state.generation == generation {
                    state.in_flight.remove(&url);
                    if let Ok(image) = &result {
                        if let Some(evicted) = state.insert(&url, image.clone()) {
                            debug!(url = %evicted, "Evicted oldest image from memory cache");
                        }
                    }
                }
            }

            match &result {
                Ok(image) => debug!(url = %url, bytes = image.byte_len, "Image loaded"),
                Err(e) => warn!(url = %url, error = %e, "Image load failed"),
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(LoadError::aborted(format!("load task failed: {e}"))))
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for MemoryImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryImageCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of preloads served from memory.
    pub hits: u64,
    /// Number of preloads that joined or started a load.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of cached images.
    pub size: usize,
    /// Loads currently in flight.
    pub in_flight: usize,
    /// Maximum number of cached images.
    pub capacity: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {}/{} images, {:.1}% hit rate ({} hits, {} misses), {} in flight",
            self.size, self.capacity, self.hit_rate, self.hits, self.misses, self.in_flight
        )
    }
}

#[async_trait]
impl ImageCachePort for MemoryImageCache {
    fn has(&self, url: &str) -> bool {
        self.state.lock().entries.contains(url)
    }

    fn get(&self, url: &str) -> Option<LoadedImage> {
        self.state.lock().entries.peek(url).cloned()
    }

    fn set(&self, url: &str, image: LoadedImage) {
        let evicted = self.state.lock().insert(url, image);
        trace!(url = %url, "Stored image in memory cache");
        if let Some(evicted) = evicted {
            debug!(url = %evicted, "Evicted oldest image from memory cache");
        }
    }

    async fn preload(&self, url: &str) -> LoadResult<LoadedImage> {
        match self.lookup_or_start(url) {
            Lookup::Hit(image) => Ok(image),
            Lookup::Pending(load) => load.await,
        }
    }

    async fn preload_batch(&self, urls: &[String]) -> Vec<PreloadOutcome> {
        let loads = urls.iter().map(|url| async move {
            PreloadOutcome {
                url: url.clone(),
                result: self.preload(url).await,
            }
        });
        let outcomes = join_all(loads).await;

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        debug!(total = outcomes.len(), failed, "Batch preload settled");
        outcomes
    }

    fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.in_flight.clear();
        state.generation += 1;
        debug!("Cleared memory image cache");
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Poll;

    use tokio_test::assert_pending;

    use crate::domain::ports::mocks::MockImageFetcher;

    fn cache_with(fetcher: MockImageFetcher, capacity: usize) -> (MemoryImageCache, Arc<MockImageFetcher>) {
        let fetcher = Arc::new(fetcher);
        let cache = MemoryImageCache::new(fetcher.clone(), capacity);
        (cache, fetcher)
    }

    fn image(url: &str) -> LoadedImage {
        LoadedImage::new(url, image::DynamicImage::new_rgb8(10, 10), 1)
    }

    #[test]
    fn test_set_and_get() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 10);
        cache.set("a", image("a"));

        assert!(cache.has("a"));
        assert_eq!(cache.get("a").map(|i| i.width()), Some(10));
        assert!(!cache.has("b"));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_fifo_eviction_of_first_inserted() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 3);
        for url in ["u0", "u1", "u2", "u3"] {
            cache.set(url, image(url));
        }

        assert!(!cache.has("u0"));
        assert!(cache.has("u1"));
        assert!(cache.has("u2"));
        assert!(cache.has("u3"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_default_capacity_overflow_by_one() {
        let (cache, _) = cache_with(MockImageFetcher::new(), DEFAULT_CACHE_CAPACITY);
        let urls: Vec<String> = (0..=DEFAULT_CACHE_CAPACITY).map(|i| format!("u{i}")).collect();
        for url in &urls {
            cache.set(url, image(url));
        }

        assert!(!cache.has(&urls[0]));
        assert!(urls[1..].iter().all(|u| cache.has(u)));
    }

    #[test]
    fn test_access_does_not_refresh() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 2);
        cache.set("a", image("a"));
        cache.set("b", image("b"));

        let _ = cache.get("a");
        assert!(cache.has("a"));
        cache.set("c", image("c"));

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_replace_keeps_position() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 2);
        cache.set("a", image("a"));
        cache.set("b", image("b"));

        let replacement = image("a");
        cache.set("a", replacement.clone());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some_and(|i| i.same_image(&replacement)));

        cache.set("c", image("c"));
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 0);
        assert_eq!(cache.capacity(), 1);
    }

    #[tokio::test]
    async fn test_preload_hit_skips_fetch() {
        let (cache, fetcher) = cache_with(MockImageFetcher::new(), 10);
        let cached = image("a");
        cache.set("a", cached.clone());

        let loaded = cache.preload("a").await.unwrap();

        assert!(loaded.same_image(&cached));
        assert_eq!(fetcher.total_calls(), 0);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_concurrent_preloads_share_one_fetch() {
        let (cache, fetcher) = cache_with(MockImageFetcher::new(), 10);

        let (first, second) = tokio::join!(cache.preload("a"), cache.preload("a"));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(fetcher.calls("a"), 1);
        assert!(first.same_image(&second));
        assert!(cache.has("a"));
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_in_flight_registered_until_completion() {
        let (fetcher, gate) = MockImageFetcher::new().gated();
        let (cache, fetcher) = cache_with(fetcher, 10);

        let mut first = tokio_test::task::spawn(cache.preload("a"));
        let mut second = tokio_test::task::spawn(cache.preload("a"));
        assert_pending!(first.poll());
        assert_pending!(second.poll());
        assert_eq!(cache.in_flight_count(), 1);

        gate.add_permits(1);

        let first = loop {
            if let Poll::Ready(result) = first.poll() {
                break result;
            }
            tokio::task::yield_now().await;
        };
        let second = loop {
            if let Poll::Ready(result) = second.poll() {
                break result;
            }
            tokio::task::yield_now().await;
        };

        assert!(first.unwrap().same_image(&second.unwrap()));
        assert_eq!(fetcher.calls("a"), 1);
        assert_eq!(cache.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (cache, fetcher) = cache_with(MockImageFetcher::new().failing("bad"), 10);

        let err = cache.preload("bad").await.unwrap_err();
        assert_eq!(err, LoadError::http(404, "bad"));
        assert!(!cache.has("bad"));
        assert_eq!(cache.in_flight_count(), 0);

        assert!(cache.preload("bad").await.is_err());
        assert_eq!(fetcher.calls("bad"), 2);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let (cache, _) = cache_with(MockImageFetcher::new().failing("bad"), 10);
        let urls = vec!["good1".to_string(), "bad".to_string(), "good2".to_string()];

        let outcomes = cache.preload_batch(&urls).await;

        let ok: Vec<bool> = outcomes.iter().map(PreloadOutcome::is_ok).collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(outcomes[1].url, "bad");
        assert!(cache.has("good1"));
        assert!(cache.has("good2"));
        assert!(!cache.has("bad"));
    }

    #[tokio::test]
    async fn test_clear_discards_late_results() {
        let (fetcher, gate) = MockImageFetcher::new().gated();
        let (cache, _) = cache_with(fetcher, 10);
        let cache = Arc::new(cache);
        cache.set("old", image("old"));

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.preload("a").await })
        };
        while cache.in_flight_count() == 0 {
            tokio::task::yield_now().await;
        }

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.in_flight_count(), 0);

        gate.add_permits(1);
        let result = waiter.await.unwrap();

        assert!(result.is_ok());
        assert!(!cache.has("a"));
    }

    #[tokio::test]
    async fn test_stats() {
        let (cache, _) = cache_with(MockImageFetcher::new(), 10);

        cache.preload("a").await.unwrap();
        cache.preload("a").await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
        assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);
    }
}
