//! Storefront images - adaptive image delivery for storage-backed product photos.
//!
//! This crate rewrites storage URLs into sized, re-encoded variants, picks
//! per-context presets, caches decoded images with request de-duplication
//! and defers offscreen loads until they come near the viewport.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer coordinating mounted images.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer containing the image controller and CLI.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "storefront-images";
