//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (URL transforms, presets, caching, fetching).
pub mod image;
/// Viewport visibility notifications.
pub mod visibility;

pub use config::{AppConfig, CliArgs, Command, LogLevel, StorageManager};
pub use image::{
    CacheStats, HttpFetcherConfig, HttpImageFetcher, MemoryImageCache, ResolvedImage,
    StorageBackend, optimize_image_url,
};
pub use visibility::ViewportObserver;
