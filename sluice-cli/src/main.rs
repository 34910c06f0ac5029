use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use sluice_engine::{DownloadConfig, Downloader, ProgressListener};
use tracing::{info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[derive(Debug, Parser)]
#[command(
    name = "sluice",
    version,
    about = "Parallel HTTP file downloader using byte-range requests"
)]
struct Args {
    /// URL to download (http:// or https://)
    url: String,

    /// Destination file path
    output: PathBuf,

    /// Byte range size per request
    #[arg(long, default_value_t = 1024 * 1024)]
    chunk_size: u64,

    /// Maximum concurrent range requests
    #[arg(long, default_value_t = 4)]
    parallel: usize,

    /// Retries per failed request
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Base retry delay in milliseconds; doubles after each attempt
    #[arg(long, default_value_t = 1000)]
    retry_delay: u64,

    /// Fail when the origin lacks range support instead of falling back
    /// to a single full-body request
    #[arg(long)]
    no_fallback: bool,

    /// Only log errors and hide the progress bar
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Drives the progress bar from downloader callbacks. The total is only
/// known after the metadata probe, so the length is set lazily on the first
/// update.
struct BarListener {
    bar: ProgressBar,
}

impl ProgressListener for BarListener {
    fn on_progress(&self, bytes_downloaded: u64, total_bytes: u64) {
        if self.bar.length() != Some(total_bytes) {
            self.bar.set_length(total_bytes);
        }
        self.bar.set_position(bytes_downloaded);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_directive = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn make_progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .unwrap()
            .progress_chars("=> "),
    );
    bar
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
        return Err(format!("URL must start with http:// or https://, got `{}`", args.url).into());
    }

    let config = DownloadConfig::builder()
        .chunk_size(args.chunk_size)
        .max_parallel_downloads(args.parallel)
        .max_retries(args.retries)
        .retry_delay(Duration::from_millis(args.retry_delay))
        .require_range_support(args.no_fallback)
        .build()?;

    let bar = make_progress_bar(args.quiet);
    let listener = Arc::new(BarListener { bar: bar.clone() });
    let downloader = Downloader::new(config)?.with_listener(listener);

    let started = Instant::now();
    match downloader.download(&args.url, &args.output).await {
        Ok(()) => {
            bar.finish_and_clear();
            let size = tokio::fs::metadata(&args.output)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            info!(
                path = %args.output.display(),
                size = %HumanBytes(size),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Download complete"
            );
            Ok(())
        }
        Err(err) => {
            bar.abandon();
            if args.output.exists() {
                warn!(
                    path = %args.output.display(),
                    "Partial output file left in place"
                );
            }
            Err(err.into())
        }
    }
}
