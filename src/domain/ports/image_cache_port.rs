//! Port definition for the in-memory image cache.

use async_trait::async_trait;

use crate::domain::entities::LoadedImage;
use crate::domain::errors::LoadResult;

/// Outcome of one URL in a batch preload.
#[derive(Debug, Clone)]
pub struct PreloadOutcome {
    /// The requested URL.
    pub url: String,
    /// Its individual result.
    pub result: LoadResult<LoadedImage>,
}

impl PreloadOutcome {
    /// Returns true if the image loaded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Port for caching loaded images by final request URL.
/// Implementations must be thread-safe.
#[async_trait]
pub trait ImageCachePort: Send + Sync {
    /// Returns true if `url` is cached. No side effects.
    fn has(&self, url: &str) -> bool;

    /// Returns the cached handle for `url`. No side effects.
    fn get(&self, url: &str) -> Option<LoadedImage>;

    /// Stores a handle, evicting the oldest insertion when full.
    fn set(&self, url: &str, image: LoadedImage);

    /// Loads `url` once, sharing any in-flight request for the same URL.
    async fn preload(&self, url: &str) -> LoadResult<LoadedImage>;

    /// Preloads every URL concurrently; one failure never aborts the rest.
    /// Outcomes are returned in input order.
    async fn preload_batch(&self, urls: &[String]) -> Vec<PreloadOutcome>;

    /// Drops every entry and all in-flight bookkeeping.
    fn clear(&self);

    /// Returns the current number of cached images.
    fn len(&self) -> usize;

    /// Returns true if the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
