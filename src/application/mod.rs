//! Application layer coordinating mounted images.

/// Application services.
pub mod services;

pub use services::{ImageDeliveryService, ImageLoadedEvent};
