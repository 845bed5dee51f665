//! Domain types for image delivery.

use std::sync::Arc;

use serde::Serialize;

/// Identifies one mounted image instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(uuid::Uuid);

impl ElementId {
    /// Creates a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded image, cheap to clone.
#[derive(Clone)]
pub struct LoadedImage {
    /// The final request URL the image was fetched from.
    pub url: String,
    /// Decoded pixels.
    pub image: Arc<image::DynamicImage>,
    /// Size of the encoded payload in bytes.
    pub byte_len: usize,
}

impl LoadedImage {
    /// Wraps a decoded image.
    #[must_use]
    pub fn new(url: impl Into<String>, image: image::DynamicImage, byte_len: usize) -> Self {
        Self {
            url: url.into(),
            image: Arc::new(image),
            byte_len,
        }
    }

    /// Pixel width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Pixel height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns true if both handles point at the same decoded image.
    #[must_use]
    pub fn same_image(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.image, &other.image)
    }
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("url", &self.url)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("byte_len", &self.byte_len)
            .finish()
    }
}

/// Per-instance loading state.
///
/// `Loaded` and `Errored` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadState {
    /// Waiting for priority or visibility.
    #[default]
    NotRequested,
    /// Fetch in progress.
    Loading,
    /// Image is ready for display.
    Loaded,
    /// Fetch or decode failed.
    Errored,
}

impl LoadState {
    /// Returns true for `Loaded` and `Errored`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Errored)
    }

    /// Returns true while a fetch is in progress.
    #[must_use]
    pub const fn is_loading(self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns true if loading has not been requested yet.
    #[must_use]
    pub const fn is_not_requested(self) -> bool {
        matches!(self, Self::NotRequested)
    }
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRequested => write!(f, "not-requested"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Errored => write!(f, "errored"),
        }
    }
}

/// One entry of a responsive variant set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponsiveVariant {
    /// Transformed URL.
    pub url: String,
    /// Width in pixels.
    pub width: u32,
    /// Width descriptor, e.g. `600w`.
    pub descriptor: String,
}

/// Variants ordered by ascending width.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariantSet(Vec<ResponsiveVariant>);

impl VariantSet {
    /// Builds a set; entries are sorted by width and duplicate widths dropped.
    #[must_use]
    pub fn new(mut variants: Vec<ResponsiveVariant>) -> Self {
        variants.sort_by_key(|v| v.width);
        variants.dedup_by_key(|v| v.width);
        Self(variants)
    }

    /// The widest variant.
    #[must_use]
    pub fn largest(&self) -> Option<&ResponsiveVariant> {
        self.0.last()
    }

    /// Iterates in ascending width order.
    pub fn iter(&self) -> std::slice::Iter<'_, ResponsiveVariant> {
        self.0.iter()
    }

    /// Number of variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no variants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders `url 300w, url 600w, ...`.
    #[must_use]
    pub fn to_srcset(&self) -> String {
        self.0
            .iter()
            .map(|v| format!("{} {}", v.url, v.descriptor))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl<'a> IntoIterator for &'a VariantSet {
    type Item = &'a ResponsiveVariant;
    type IntoIter = std::slice::Iter<'a, ResponsiveVariant>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
