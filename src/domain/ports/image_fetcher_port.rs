//! Port for fetching and decoding a single image.

use async_trait::async_trait;

use crate::domain::entities::LoadedImage;
use crate::domain::errors::LoadResult;

/// Fetches the bytes behind a URL and decodes them.
///
/// This is the native loading mechanism the cache delegates to; it never
/// caches or de-duplicates on its own.
#[async_trait]
pub trait ImageFetcherPort: Send + Sync {
    /// Fetches and decodes the image at `url`.
    async fn fetch(&self, url: &str) -> LoadResult<LoadedImage>;
}
