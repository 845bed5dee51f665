//! Viewport visibility notifications.

mod viewport_observer;

pub use viewport_observer::ViewportObserver;
