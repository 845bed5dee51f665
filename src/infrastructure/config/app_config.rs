//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::entities::ImageContext;
use crate::infrastructure::image::http_fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::infrastructure::image::storage_url::DEFAULT_MARKERS;
use crate::infrastructure::image::{DEFAULT_CACHE_CAPACITY, HttpFetcherConfig, StorageBackend};

const APP_NAME: &str = "storefront-images";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";
pub(super) const CONFIG_FILE_NAME: &str = "config.toml";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Application configuration loaded from TOML.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Storage backend recognition.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Memory cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP settings.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Lazy loading margins.
    #[serde(default)]
    pub loading: LoadingConfig,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// URL substrings identifying transformable images.
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

impl StorageConfig {
    /// Builds the backend matcher.
    #[must_use]
    pub fn backend(&self) -> StorageBackend {
        StorageBackend::new(self.markers.iter().cloned())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

/// Memory cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of decoded images kept in memory.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl NetworkConfig {
    /// Fetcher settings derived from this section.
    #[must_use]
    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            timeout_secs: self.timeout_secs,
            user_agent: self.user_agent.clone(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: default_user_agent(),
        }
    }
}

/// Lazy loading configuration.
///
/// Unset margins fall back to each context's own default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Margin for main grids and hero images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_margin: Option<u32>,

    /// Margin for thumbnail strips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_margin: Option<u32>,
}

impl LoadingConfig {
    /// Proximity margin to use for `context`.
    #[must_use]
    pub fn margin_for(&self, context: ImageContext) -> u32 {
        let configured = if context.is_primary() {
            self.primary_margin
        } else {
            self.secondary_margin
        };
        configured.unwrap_or(context.profile().root_margin)
    }
}

fn default_markers() -> Vec<String> {
    DEFAULT_MARKERS.iter().map(|m| (*m).to_string()).collect()
}

const fn default_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if !args.marker.is_empty() {
            self.storage.markers.clone_from(&args.marker);
        }
        if let Some(timeout_secs) = args.timeout_secs {
            self.network.timeout_secs = timeout_secs;
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }

    /// Returns effective log path. Logging goes to stderr when unset.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            network: NetworkConfig::default(),
            loading: LoadingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_config_sections() {
        let toml_content = r#"
            log_level = "debug"

            [storage]
            markers = ["supabase.co/storage", "img.shop.test"]

            [cache]
            capacity = 250

            [loading]
            secondary_margin = 80
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.storage.markers.len(), 2);
        assert!(config.storage.backend().is_transformable("https://img.shop.test/a.jpg"));
        assert_eq!(config.cache.capacity, 250);
        assert_eq!(config.network.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.loading.margin_for(ImageContext::GalleryThumb), 80);
        assert_eq!(config.loading.margin_for(ImageContext::Card), 400);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.storage.markers, vec!["supabase".to_string()]);
        assert_eq!(config.cache.capacity, 100);
        assert_eq!(config.loading, LoadingConfig::default());
        assert_eq!(config.loading.margin_for(ImageContext::Thumbnail), 200);
    }

    #[test]
    fn test_log_level_maps_to_tracing() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
        assert_eq!(LogLevel::default().to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_effective_config_path_prefers_cli() {
        let mut config = AppConfig::default();
        assert_eq!(config.effective_config_path(), AppConfig::default_config_path());

        let args = CliArgs::parse_from(["storefront-images", "--config", "/tmp/shop.toml", "srcset", "u"]);
        config.merge_with_args(&args);
        assert_eq!(config.effective_config_path(), Some(PathBuf::from("/tmp/shop.toml")));
    }

    #[test]
    fn test_merge_with_args() {
        let args = CliArgs::parse_from([
            "storefront-images",
            "--log-level",
            "trace",
            "--marker",
            "cdn.test",
            "--timeout-secs",
            "5",
            "url",
            "https://cdn.test/a.jpg",
        ]);
        let mut config = AppConfig::default();
        config.merge_with_args(&args);

        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.storage.markers, vec!["cdn.test".to_string()]);
        assert_eq!(config.network.timeout_secs, 5);
    }
}
