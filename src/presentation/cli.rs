//! Command-line front end.

use std::process::ExitCode;
use std::sync::Arc;

use color_eyre::eyre::{Result, WrapErr};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::entities::{DEFAULT_QUALITY, ImageContext, ImageFormat, TransformOptions};
use crate::domain::ports::{ImageCachePort, PreloadOutcome};
use crate::infrastructure::config::{AppConfig, Command};
use crate::infrastructure::image::{
    HttpImageFetcher, MemoryImageCache, ResolvedImage, StorageBackend,
};

/// Runs one command and returns the process exit code.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or output cannot be
/// serialized.
pub async fn run(command: Command, config: &AppConfig) -> Result<ExitCode> {
    let backend = config.storage.backend();

    match command {
        Command::Url {
            url,
            context,
            width,
            height,
            quality,
            format,
            no_resize,
        } => {
            let transformed = match context {
                Some(context) => render_context_url(&backend, &url, context),
                None => {
                    let options = TransformOptions {
                        width,
                        height,
                        quality: quality.unwrap_or(DEFAULT_QUALITY),
                        format: format.unwrap_or(ImageFormat::Auto),
                        resize: !no_resize,
                    };
                    backend.build_url(&url, &options)
                }
            };
            println!("{transformed}");
            Ok(ExitCode::SUCCESS)
        }

        Command::Srcset { url, context, json } => {
            println!("{}", render_srcset(&backend, &url, context, json)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Preload {
            urls,
            context,
            capacity,
            json,
        } => {
            let fetcher = HttpImageFetcher::new(&config.network.fetcher_config())
                .wrap_err("Failed to create HTTP client")?;
            let cache = MemoryImageCache::new(
                Arc::new(fetcher),
                capacity.unwrap_or(config.cache.capacity),
            );

            let targets = preload_targets(&backend, &urls, context);
            info!(count = targets.len(), "Preloading images");
            let outcomes = cache.preload_batch(&targets).await;
            let stats = cache.stats();
            info!(%stats, "Preload finished");

            println!("{}", render_preload(&outcomes, json)?);
            if !json {
                println!("{stats}");
            }
            Ok(preload_exit_code(&outcomes))
        }
    }
}

fn render_context_url(backend: &StorageBackend, url: &str, context: ImageContext) -> String {
    backend.build_url(url, &context.profile().options())
}

#[derive(Debug, Serialize)]
struct SrcsetOutput<'a> {
    src: &'a str,
    srcset: &'a str,
    sizes: &'a str,
    largest: &'a str,
}

fn render_srcset(backend: &StorageBackend, url: &str, context: ImageContext, json: bool) -> Result<String> {
    let resolved = ResolvedImage::resolve_with(backend, url, context);
    if json {
        let output = SrcsetOutput {
            src: &resolved.src,
            srcset: &resolved.srcset,
            sizes: resolved.sizes,
            largest: resolved.largest_url(),
        };
        return serde_json::to_string_pretty(&output).wrap_err("Failed to serialize srcset");
    }

    Ok(format!(
        "src: {}\nsrcset: {}\nsizes: {}\nlargest: {}",
        resolved.src,
        resolved.srcset,
        resolved.sizes,
        resolved.largest_url()
    ))
}

fn preload_targets(backend: &StorageBackend, urls: &[String], context: Option<ImageContext>) -> Vec<String> {
    match context {
        Some(context) => urls
            .iter()
            .map(|url| render_context_url(backend, url, context))
            .collect(),
        None => urls.to_vec(),
    }
}

#[derive(Debug, Serialize)]
struct PreloadReport<'a> {
    url: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a PreloadOutcome> for PreloadReport<'a> {
    fn from(outcome: &'a PreloadOutcome) -> Self {
        match &outcome.result {
            Ok(image) => Self {
                url: &outcome.url,
                ok: true,
                width: Some(image.width()),
                height: Some(image.height()),
                bytes: Some(image.byte_len),
                error: None,
            },
            Err(e) => Self {
                url: &outcome.url,
                ok: false,
                width: None,
                height: None,
                bytes: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn render_preload(outcomes: &[PreloadOutcome], json: bool) -> Result<String> {
    let reports: Vec<PreloadReport<'_>> = outcomes.iter().map(PreloadReport::from).collect();
    if json {
        return serde_json::to_string_pretty(&reports).wrap_err("Failed to serialize preload report");
    }

    let lines: Vec<String> = reports
        .iter()
        .map(|r| match (&r.error, r.width, r.height) {
            (Some(error), _, _) => format!("FAIL {} ({error})", r.url),
            (None, Some(w), Some(h)) => format!("OK   {} {w}x{h}", r.url),
            (None, _, _) => format!("OK   {}", r.url),
        })
        .collect();
    Ok(lines.join("\n"))
}

fn preload_exit_code(outcomes: &[PreloadOutcome]) -> ExitCode {
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "Some images failed to preload");
    }
    if !outcomes.is_empty() && failed == outcomes.len() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
