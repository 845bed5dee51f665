//! Transformation options understood by the storage backend.

use serde::{Deserialize, Serialize};

/// Quality used when none is requested.
pub const DEFAULT_QUALITY: u8 = 80;

/// Quality value the backend treats as "no re-encode"; never emitted.
pub const LOSSLESS_QUALITY: u8 = 100;

/// Output format requested from the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// WebP output.
    Webp,
    /// AVIF output.
    Avif,
    /// Let the backend negotiate; no parameter is sent.
    #[default]
    Auto,
}

impl ImageFormat {
    /// Query parameter value, or `None` for [`ImageFormat::Auto`].
    #[must_use]
    pub const fn as_param(self) -> Option<&'static str> {
        match self {
            Self::Webp => Some("webp"),
            Self::Avif => Some("avif"),
            Self::Auto => None,
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webp => write!(f, "webp"),
            Self::Avif => write!(f, "avif"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// A value record describing how an image should be transformed.
///
/// Two equal option sets always produce the same URL, which is what makes the
/// transformed URL usable as a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformOptions {
    /// Target width in pixels.
    #[serde(default)]
    pub width: Option<u32>,
    /// Target height in pixels.
    #[serde(default)]
    pub height: Option<u32>,
    /// Encoding quality, 1-100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output format.
    #[serde(default)]
    pub format: ImageFormat,
    /// Crop-to-fill when a dimension is set.
    #[serde(default = "default_resize")]
    pub resize: bool,
}

const fn default_quality() -> u8 {
    DEFAULT_QUALITY
}

const fn default_resize() -> bool {
    true
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            quality: DEFAULT_QUALITY,
            format: ImageFormat::Auto,
            resize: true,
        }
    }
}

impl TransformOptions {
    /// Creates options with defaults (quality 80, auto format, resize on).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target width.
    #[must_use]
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the target height.
    #[must_use]
    pub const fn with_height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Sets the quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Enables or disables crop-to-fill resizing.
    #[must_use]
    pub const fn with_resize(mut self, resize: bool) -> Self {
        self.resize = resize;
        self
    }

    /// Quality clamped into the valid 1-100 range.
    #[must_use]
    pub fn effective_quality(&self) -> u8 {
        self.quality.clamp(1, LOSSLESS_QUALITY)
    }

    /// Returns true if at least one dimension is set.
    #[must_use]
    pub const fn has_dimensions(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TransformOptions::default();
        assert_eq!(opts.quality, 80);
        assert_eq!(opts.format, ImageFormat::Auto);
        assert!(opts.resize);
        assert!(!opts.has_dimensions());
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(TransformOptions::new().with_quality(0).effective_quality(), 1);
        assert_eq!(TransformOptions::new().with_quality(250).effective_quality(), 100);
        assert_eq!(TransformOptions::new().with_quality(75).effective_quality(), 75);
    }

    #[test]
    fn test_auto_format_has_no_param() {
        assert_eq!(ImageFormat::Auto.as_param(), None);
        assert_eq!(ImageFormat::Webp.as_param(), Some("webp"));
        assert_eq!(ImageFormat::Avif.as_param(), Some("avif"));
    }

    #[test]
    fn test_deserialize_partial_options() {
        let opts: TransformOptions = toml::from_str("width = 640\nformat = \"avif\"").unwrap();
        assert_eq!(opts.width, Some(640));
        assert_eq!(opts.height, None);
        assert_eq!(opts.quality, 80);
        assert_eq!(opts.format, ImageFormat::Avif);
        assert!(opts.resize);
    }
}
