//! Parallel HTTP file downloader.
//!
//! Given a URL and an output path, `sluice` probes the origin, partitions the
//! content length into inclusive byte ranges, fetches them concurrently under
//! a strict parallelism ceiling, and writes each verified chunk directly to
//! its offset in a pre-sized file. Transient network faults are retried with
//! exponential backoff; origins without range support fall back to a single
//! full-body request.
//!
//! ```no_run
//! use sluice_engine::{DownloadConfig, Downloader};
//!
//! # async fn run() -> Result<(), sluice_engine::DownloadError> {
//! let config = DownloadConfig::builder()
//!     .chunk_size(4 * 1024 * 1024)
//!     .max_parallel_downloads(8)
//!     .build()?;
//! let downloader = Downloader::new(config)?;
//! downloader
//!     .download("https://example.com/large.bin", "large.bin".as_ref())
//!     .await
//! # }
//! ```

pub mod chunk;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
mod fetcher;
pub mod progress;
pub mod retry;
pub mod writer;

pub use chunk::{split_ranges, ByteRange};
pub use client::{FileMetadata, HttpClient, HttpConfig, ReqwestClient};
pub use config::{DownloadConfig, DownloadConfigBuilder};
pub use downloader::Downloader;
pub use error::DownloadError;
pub use progress::ProgressListener;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use writer::PositionalWriter;
