//! Usage contexts and their per-context delivery profiles.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::transform::{ImageFormat, TransformOptions};

/// Width/height ratio of a rendered image box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Horizontal component.
    pub width: u32,
    /// Vertical component.
    pub height: u32,
}

impl AspectRatio {
    /// 3:4 portrait, the product photography convention.
    pub const PORTRAIT: Self = Self::new(3, 4);
    /// 1:1.
    pub const SQUARE: Self = Self::new(1, 1);

    /// Creates a ratio; zero components are bumped to one.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self {
            width: if width == 0 { 1 } else { width },
            height: if height == 0 { 1 } else { height },
        }
    }

    /// Height of a box of the given width with this ratio.
    #[must_use]
    pub fn height_for(&self, width: f64) -> f64 {
        width * f64::from(self.height) / f64::from(self.width)
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.width, self.height)
    }
}

/// Everything a context needs to deliver an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextProfile {
    /// Target width.
    pub width: u32,
    /// Target height, if the context crops.
    pub height: Option<u32>,
    /// Encoding quality.
    pub quality: u8,
    /// Output format.
    pub format: ImageFormat,
    /// Ascending widths for the responsive variant set.
    pub width_ladder: &'static [u32],
    /// Static `sizes` hint.
    pub sizes: &'static str,
    /// Default proximity margin, in pixels, for lazy loading.
    pub root_margin: u32,
}

impl ContextProfile {
    /// Transform options for the single-URL preset.
    #[must_use]
    pub const fn options(&self) -> TransformOptions {
        TransformOptions {
            width: Some(self.width),
            height: self.height,
            quality: self.quality,
            format: self.format,
            resize: true,
        }
    }
}

const THUMBNAIL: ContextProfile = ContextProfile {
    width: 100,
    height: Some(133),
    quality: 70,
    format: ImageFormat::Webp,
    width_ladder: &[100, 200],
    sizes: "100px",
    root_margin: 200,
};

const CARD: ContextProfile = ContextProfile {
    width: 600,
    height: Some(800),
    quality: 75,
    format: ImageFormat::Webp,
    width_ladder: &[300, 400, 600, 800],
    sizes: "(max-width: 640px) 50vw, (max-width: 1024px) 33vw, 25vw",
    root_margin: 400,
};

const DETAIL: ContextProfile = ContextProfile {
    width: 1200,
    height: Some(1600),
    quality: 85,
    format: ImageFormat::Webp,
    width_ladder: &[600, 800, 1200, 1600],
    sizes: "(max-width: 768px) 100vw, 50vw",
    root_margin: 400,
};

const GALLERY_THUMB: ContextProfile = ContextProfile {
    width: 200,
    height: Some(267),
    quality: 70,
    format: ImageFormat::Webp,
    width_ladder: &[150, 200, 300],
    sizes: "(max-width: 640px) 25vw, 200px",
    root_margin: 150,
};

const FULL: ContextProfile = ContextProfile {
    width: 1920,
    height: None,
    quality: 90,
    format: ImageFormat::Webp,
    width_ladder: &[800, 1200, 1600, 1920],
    sizes: "100vw",
    root_margin: 400,
};

/// Where an image is displayed.
///
/// Each variant owns exactly one [`ContextProfile`], so the single-URL preset,
/// the responsive ladder and the sizes hint can never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageContext {
    /// Cart lines, admin tables.
    Thumbnail,
    /// Product grid cards.
    Card,
    /// Product detail page.
    Detail,
    /// Thumbnail strip under a gallery.
    #[serde(alias = "galleryThumb")]
    GalleryThumb,
    /// Full-screen viewer.
    Full,
}

impl ImageContext {
    /// All contexts.
    pub const ALL: [Self; 5] = [
        Self::Thumbnail,
        Self::Card,
        Self::Detail,
        Self::GalleryThumb,
        Self::Full,
    ];

    /// The delivery profile for this context.
    #[must_use]
    pub const fn profile(self) -> &'static ContextProfile {
        match self {
            Self::Thumbnail => &THUMBNAIL,
            Self::Card => &CARD,
            Self::Detail => &DETAIL,
            Self::GalleryThumb => &GALLERY_THUMB,
            Self::Full => &FULL,
        }
    }

    /// Primary contexts are main grids and hero images; the rest are
    /// secondary strips loaded with a tighter margin.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Card | Self::Detail | Self::Full)
    }

    /// Name used in config files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Card => "card",
            Self::Detail => "detail",
            Self::GalleryThumb => "gallery-thumb",
            Self::Full => "full",
        }
    }
}

impl std::fmt::Display for ImageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a context name is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image context: {0}")]
pub struct UnknownContext(pub String);

impl FromStr for ImageContext {
    type Err = UnknownContext;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "thumbnail" => Ok(Self::Thumbnail),
            "card" => Ok(Self::Card),
            "detail" => Ok(Self::Detail),
            "gallery-thumb" | "galleryThumb" | "gallery_thumb" => Ok(Self::GalleryThumb),
            "full" => Ok(Self::Full),
            other => Err(UnknownContext(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladders_are_strictly_ascending() {
        for ctx in ImageContext::ALL {
            let ladder = ctx.profile().width_ladder;
            assert!(!ladder.is_empty(), "{ctx} has an empty ladder");
            assert!(
                ladder.windows(2).all(|w| w[0] < w[1]),
                "{ctx} ladder is not ascending"
            );
        }
    }

    #[test]
    fn test_cropped_contexts_are_portrait() {
        for ctx in ImageContext::ALL {
            let profile = ctx.profile();
            if let Some(height) = profile.height {
                let expected = AspectRatio::PORTRAIT.height_for(f64::from(profile.width));
                assert!(
                    (f64::from(height) - expected).abs() < 1.0,
                    "{ctx} is not 3:4"
                );
            }
        }
    }

    #[test]
    fn test_parse_round_trips_names() {
        for ctx in ImageContext::ALL {
            assert_eq!(ctx.as_str().parse::<ImageContext>(), Ok(ctx));
        }
        assert_eq!("galleryThumb".parse(), Ok(ImageContext::GalleryThumb));
        assert!("hero".parse::<ImageContext>().is_err());
    }

    #[test]
    fn test_zero_ratio_components() {
        let ratio = AspectRatio::new(0, 4);
        assert_eq!(ratio.width, 1);
        assert!((ratio.height_for(10.0) - 40.0).abs() < f64::EPSILON);
    }
}
