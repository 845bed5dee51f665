//! Storage backend URL transformation.
//!
//! Rewrites object URLs into on-the-fly transformation requests. URLs that do
//! not belong to the storage backend pass through untouched.

use std::sync::LazyLock;

use crate::domain::entities::{
    ImageFormat, LOSSLESS_QUALITY, ResponsiveVariant, TransformOptions, VariantSet,
};

/// Substrings identifying transformable URLs by default.
pub const DEFAULT_MARKERS: &[&str] = &["supabase"];

/// Value of the `resize` parameter when emitted.
pub const RESIZE_MODE: &str = "cover";

/// Query keys owned by the transformer; replaced rather than duplicated.
const TRANSFORM_KEYS: [&str; 5] = ["width", "height", "resize", "quality", "format"];

static DEFAULT_BACKEND: LazyLock<StorageBackend> = LazyLock::new(StorageBackend::default);

/// The transformable storage backend, recognised by URL markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBackend {
    markers: Vec<String>,
}

impl StorageBackend {
    /// Creates a backend matching any of `markers`. Empty markers are ignored.
    #[must_use]
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(Into::into)
                .filter(|m: &String| !m.trim().is_empty())
                .collect(),
        }
    }

    /// The configured markers.
    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Checks if a URL belongs to the backend.
    #[must_use]
    pub fn is_transformable(&self, url: &str) -> bool {
        !url.trim().is_empty() && self.markers.iter().any(|m| url.contains(m.as_str()))
    }

    /// Builds the transformation request URL for `url`.
    ///
    /// Only meaningful parameters are emitted: `resize` needs a dimension,
    /// `quality` is dropped at 100 and `format` is dropped for `auto`.
    /// Transform keys already present on `url` are replaced; other query
    /// parameters and the fragment are kept, so the call is idempotent.
    #[must_use]
    pub fn build_url(&self, url: &str, options: &TransformOptions) -> String {
        if !self.is_transformable(url) {
            return url.to_string();
        }

        let (without_fragment, fragment) = match url.find('#') {
            Some(idx) => (&url[..idx], &url[idx..]),
            None => (url, ""),
        };
        let (base, existing_params) = match without_fragment.find('?') {
            Some(idx) => (&without_fragment[..idx], Some(&without_fragment[idx + 1..])),
            None => (without_fragment, None),
        };

        let mut params: Vec<String> = Vec::new();

        // Preserve any existing parameters that we don't override
        if let Some(existing) = existing_params {
            for param in existing.split('&').filter(|p| !p.is_empty()) {
                let key = param.split('=').next().unwrap_or("");
                if !TRANSFORM_KEYS.contains(&key) {
                    params.push(param.to_string());
                }
            }
        }

        params.extend(transform_params(options));

        if params.is_empty() {
            format!("{base}{fragment}")
        } else {
            format!("{base}?{}{fragment}", params.join("&"))
        }
    }

    /// Builds one variant per width, narrowest first.
    #[must_use]
    pub fn build_variant_set(
        &self,
        url: &str,
        widths: &[u32],
        quality: u8,
        format: ImageFormat,
    ) -> VariantSet {
        let variants = widths
            .iter()
            .map(|&width| {
                let options = TransformOptions::new()
                    .with_width(width)
                    .with_quality(quality)
                    .with_format(format);
                ResponsiveVariant {
                    url: self.build_url(url, &options),
                    width,
                    descriptor: format!("{width}w"),
                }
            })
            .collect();
        VariantSet::new(variants)
    }

    /// Builds the `url 300w, url 600w` string for `widths`.
    #[must_use]
    pub fn build_srcset(&self, url: &str, widths: &[u32], quality: u8, format: ImageFormat) -> String {
        self.build_variant_set(url, widths, quality, format).to_srcset()
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().copied())
    }
}

fn transform_params(options: &TransformOptions) -> Vec<String> {
    let mut params = Vec::with_capacity(TRANSFORM_KEYS.len());

    if let Some(width) = options.width {
        params.push(format!("width={width}"));
    }
    if let Some(height) = options.height {
        params.push(format!("height={height}"));
    }
    if options.resize && options.has_dimensions() {
        params.push(format!("resize={RESIZE_MODE}"));
    }

    let quality = options.effective_quality();
    if quality != LOSSLESS_QUALITY {
        params.push(format!("quality={quality}"));
    }
    if let Some(format) = options.format.as_param() {
        params.push(format!("format={format}"));
    }

    params
}

/// The backend with [`DEFAULT_MARKERS`].
#[must_use]
pub fn default_backend() -> &'static StorageBackend {
    &DEFAULT_BACKEND
}

/// Checks if a URL belongs to the default backend.
#[must_use]
pub fn is_storage_url(url: &str) -> bool {
    DEFAULT_BACKEND.is_transformable(url)
}

/// Transforms `url` against the default backend.
#[must_use]
pub fn optimize_image_url(url: &str, options: &TransformOptions) -> String {
    DEFAULT_BACKEND.build_url(url, options)
}

/// Builds a variant set against the default backend.
#[must_use]
pub fn build_variant_set(url: &str, widths: &[u32], quality: u8, format: ImageFormat) -> VariantSet {
    DEFAULT_BACKEND.build_variant_set(url, widths, quality, format)
}

/// Builds a srcset string against the default backend.
#[must_use]
pub fn build_srcset(url: &str, widths: &[u32], quality: u8, format: ImageFormat) -> String {
    DEFAULT_BACKEND.build_srcset(url, widths, quality, format)
}
