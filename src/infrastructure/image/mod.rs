//! Image delivery infrastructure.
//!
//! This module provides:
//! - Storage backend URL transformation and responsive variants
//! - Context presets
//! - Memory caching with FIFO eviction and load de-duplication
//! - HTTP fetching and decoding

pub mod http_fetcher;
pub mod memory_cache;
pub mod presets;
pub mod storage_url;

pub use http_fetcher::{HttpFetcherConfig, HttpImageFetcher, decode_image};
pub use memory_cache::{CacheStats, DEFAULT_CACHE_CAPACITY, MemoryImageCache};
pub use presets::{
    ResolvedImage, UrlTransform, image_preset, optimize_image_urls, sizes_preset, srcset_preset,
    variant_preset,
};
pub use storage_url::{
    StorageBackend, build_srcset, build_variant_set, default_backend, is_storage_url,
    optimize_image_url,
};
