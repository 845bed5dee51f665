//! Domain entity definitions.

mod context;
mod geometry;
mod image;
mod transform;

pub use context::{AspectRatio, ContextProfile, ImageContext, UnknownContext};
pub use geometry::{Rect, Viewport};
pub use image::{ElementId, LoadState, LoadedImage, ResponsiveVariant, VariantSet};
pub use transform::{DEFAULT_QUALITY, ImageFormat, LOSSLESS_QUALITY, TransformOptions};
