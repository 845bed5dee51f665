//! HTTP image fetcher.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::domain::entities::LoadedImage;
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::ImageFetcherPort;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent sent with image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("storefront-images/", env!("CARGO_PKG_VERSION"));

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent header.
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Downloads images over HTTP and decodes them off the async runtime.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &HttpFetcherConfig) -> LoadResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| LoadError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http_client })
    }

    /// Creates a fetcher with default configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn with_defaults() -> LoadResult<Self> {
        Self::new(&HttpFetcherConfig::default())
    }

    /// Downloads image bytes from a URL.
    async fn download(&self, url: &str) -> LoadResult<Bytes> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| LoadError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::http(status.as_u16(), url));
        }

        response
            .bytes()
            .await
            .map_err(|e| LoadError::network(format!("Failed to read body: {e}")))
    }
}

/// Decodes an encoded image on a blocking thread.
///
/// # Errors
/// Returns error if the bytes are not a supported image.
pub async fn decode_image(url: &str, bytes: Bytes) -> LoadResult<LoadedImage> {
    let byte_len = bytes.len();
    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| LoadError::aborted(format!("Decode task panicked: {e}")))?
        .map_err(|e| LoadError::decode(format!("Failed to decode image: {e}")))?;

    trace!(url = %url, width = decoded.width(), height = decoded.height(), "Decoded image");
    Ok(LoadedImage::new(url, decoded, byte_len))
}

#[async_trait]
impl ImageFetcherPort for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> LoadResult<LoadedImage> {
        debug!(url = %url, "Downloading image from network");
        let bytes = self.download(url).await?;
        decode_image(url, bytes).await
    }
}
