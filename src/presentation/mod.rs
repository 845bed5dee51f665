//! Presentation layer with the image controller and command-line front end.

/// Command-line commands.
pub mod cli;
/// Per-image loading controllers.
pub mod widgets;

pub use cli::run;
