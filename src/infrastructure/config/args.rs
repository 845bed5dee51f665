//! Command-line arguments.

use super::app_config::LogLevel;
use crate::domain::entities::{ImageContext, ImageFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Global flags and the command to run.
#[derive(Debug, Parser)]
#[command(
    name = "storefront-images",
    version,
    about = "Build storefront image URLs and warm the image cache",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Storage URL marker; repeat to match several backends.
    #[arg(long, value_name = "SUBSTRING", global = true)]
    pub marker: Vec<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the transformed URL for one image.
    Url {
        /// Source image URL.
        url: String,

        /// Use a context preset instead of explicit options.
        #[arg(long, value_enum, conflicts_with_all = ["width", "height", "quality", "format", "no_resize"])]
        context: Option<ImageContext>,

        /// Target width.
        #[arg(long)]
        width: Option<u32>,

        /// Target height.
        #[arg(long)]
        height: Option<u32>,

        /// Encoding quality (1-100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,

        /// Output format.
        #[arg(long, value_enum)]
        format: Option<ImageFormat>,

        /// Do not crop to fill.
        #[arg(long)]
        no_resize: bool,
    },

    /// Print the responsive srcset, sizes hint and largest variant.
    Srcset {
        /// Source image URL.
        url: String,

        /// Usage context.
        #[arg(long, value_enum, default_value = "card")]
        context: ImageContext,

        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },

    /// Fetch images into the memory cache and report each outcome.
    Preload {
        /// Source image URLs.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Transform every URL with this context first.
        #[arg(long, value_enum)]
        context: Option<ImageContext>,

        /// Override the cache capacity.
        #[arg(long)]
        capacity: Option<usize>,

        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },
}
