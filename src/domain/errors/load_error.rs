//! Image load error types.

use thiserror::Error;

/// Result type for image loads.
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Why an image could not be loaded.
///
/// `Clone` because one load result is fanned out to every caller that joined
/// the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum LoadError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("decode error: {message}")]
    Decode { message: String },

    #[error("load task aborted: {message}")]
    Aborted { message: String },

    #[error("image source is empty")]
    EmptySource,
}

impl LoadError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates HTTP status error.
    #[must_use]
    pub fn http(status: u16, url: impl Into<String>) -> Self {
        Self::Http {
            status,
            url: url.into(),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates aborted error.
    #[must_use]
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted {
            message: message.into(),
        }
    }

    /// Returns whether the failure may go away on a later attempt.
    ///
    /// Nothing retries automatically; this only informs the consumer.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Aborted { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Decode { .. } | Self::EmptySource => false,
        }
    }
}
