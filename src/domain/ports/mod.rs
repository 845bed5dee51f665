mod image_cache_port;
mod image_fetcher_port;
mod visibility_port;

pub use image_cache_port::{ImageCachePort, PreloadOutcome};
pub use image_fetcher_port::ImageFetcherPort;
pub use visibility_port::VisibilityPort;

#[cfg(test)]
pub mod mocks {
    pub use super::image_fetcher_port::mock::MockImageFetcher;
    pub use super::visibility_port::MockVisibilityPort;
}
