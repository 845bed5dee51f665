//! Context presets built on the storage URL transformer.

use serde::Serialize;

use crate::domain::entities::{ImageContext, TransformOptions, VariantSet};

use super::storage_url::{StorageBackend, default_backend};

/// Anything that maps a source URL to a request URL.
pub trait UrlTransform {
    /// Transforms one URL.
    fn apply(&self, url: &str) -> String;
}

impl UrlTransform for ImageContext {
    fn apply(&self, url: &str) -> String {
        image_preset(*self, url)
    }
}

impl UrlTransform for TransformOptions {
    fn apply(&self, url: &str) -> String {
        default_backend().build_url(url, self)
    }
}

/// Single transformed URL for `context`.
#[must_use]
pub fn image_preset(context: ImageContext, url: &str) -> String {
    default_backend().build_url(url, &context.profile().options())
}

/// Responsive variants for `context`.
#[must_use]
pub fn variant_preset(context: ImageContext, url: &str) -> VariantSet {
    variants_with(default_backend(), context, url)
}

/// Responsive srcset string for `context`.
#[must_use]
pub fn srcset_preset(context: ImageContext, url: &str) -> String {
    variant_preset(context, url).to_srcset()
}

/// Static sizes hint for `context`.
#[must_use]
pub const fn sizes_preset(context: ImageContext) -> &'static str {
    context.profile().sizes
}

/// Applies one transform to every URL, keeping order.
///
/// Used when all photos of a product are shown in the same context.
#[must_use]
pub fn optimize_image_urls<S, T>(urls: &[S], transform: &T) -> Vec<String>
where
    S: AsRef<str>,
    T: UrlTransform + ?Sized,
{
    urls.iter().map(|url| transform.apply(url.as_ref())).collect()
}

fn variants_with(backend: &StorageBackend, context: ImageContext, url: &str) -> VariantSet {
    let profile = context.profile();
    backend.build_variant_set(url, profile.width_ladder, profile.quality, profile.format)
}

/// Every URL and hint needed to render one source in one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedImage {
    /// Context the image was resolved for.
    pub context: ImageContext,
    /// Preset URL.
    pub src: String,
    /// Responsive variants.
    pub variants: VariantSet,
    /// Rendered srcset string.
    pub srcset: String,
    /// Sizes hint.
    pub sizes: &'static str,
}

impl ResolvedImage {
    /// Resolves against the default backend.
    #[must_use]
    pub fn resolve(url: &str, context: ImageContext) -> Self {
        Self::resolve_with(default_backend(), url, context)
    }

    /// Resolves against a specific backend.
    #[must_use]
    pub fn resolve_with(backend: &StorageBackend, url: &str, context: ImageContext) -> Self {
        let variants = variants_with(backend, context, url);
        Self {
            context,
            src: backend.build_url(url, &context.profile().options()),
            srcset: variants.to_srcset(),
            variants,
            sizes: context.profile().sizes,
        }
    }

    /// The widest variant's URL, or the preset URL when there is none.
    ///
    /// Used wherever one maximum-detail URL is needed, such as a zoom view.
    #[must_use]
    pub fn largest_url(&self) -> &str {
        self.variants
            .largest()
            .map_or(self.src.as_str(), |v| v.url.as_str())
    }
}
