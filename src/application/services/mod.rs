pub mod image_delivery;

pub use image_delivery::{ImageDeliveryService, ImageLoadedEvent};
