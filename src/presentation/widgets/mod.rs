mod adaptive_image;

pub use adaptive_image::{
    AdaptiveImage, FetchPriority, ImageAttributes, ImageProps, ImageView, LoadCallbacks,
    LoadRequest, LoadingMode,
};
