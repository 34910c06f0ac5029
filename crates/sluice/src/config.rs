use std::time::Duration;

use crate::error::DownloadError;

pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
pub const DEFAULT_MAX_PARALLEL_DOWNLOADS: usize = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Validated tuning knobs for a download.
///
/// Construct through [`DownloadConfig::new`] or [`DownloadConfig::builder`];
/// out-of-range values fail with [`DownloadError::InvalidConfig`] before any
/// network or file activity.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Size of each byte range requested from the origin. Only the final
    /// range of a plan may be smaller.
    pub chunk_size: u64,

    /// Ceiling on concurrently in-flight range requests.
    pub max_parallel_downloads: usize,

    /// Retries per failed request, on top of the initial attempt.
    pub max_retries: u32,

    /// Base delay before the first retry; doubles after every attempt.
    pub retry_delay: Duration,

    /// When set, an origin without range support fails with
    /// [`DownloadError::RangesNotSupported`] instead of falling back to a
    /// single full-body request.
    pub require_range_support: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_parallel_downloads: DEFAULT_MAX_PARALLEL_DOWNLOADS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            require_range_support: false,
        }
    }
}

impl DownloadConfig {
    pub fn new(
        chunk_size: u64,
        max_parallel_downloads: usize,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, DownloadError> {
        let config = Self {
            chunk_size,
            max_parallel_downloads,
            max_retries,
            retry_delay,
            require_range_support: false,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }

    fn validate(&self) -> Result<(), DownloadError> {
        if self.chunk_size == 0 {
            return Err(DownloadError::invalid_config("chunk size must be positive"));
        }
        if self.max_parallel_downloads == 0 {
            return Err(DownloadError::invalid_config(
                "max parallel downloads must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Builder for [`DownloadConfig`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct DownloadConfigBuilder {
    chunk_size: Option<u64>,
    max_parallel_downloads: Option<usize>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
    require_range_support: bool,
}

impl DownloadConfigBuilder {
    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn max_parallel_downloads(mut self, max_parallel_downloads: usize) -> Self {
        self.max_parallel_downloads = Some(max_parallel_downloads);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn require_range_support(mut self, require: bool) -> Self {
        self.require_range_support = require;
        self
    }

    pub fn build(self) -> Result<DownloadConfig, DownloadError> {
        let config = DownloadConfig {
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            max_parallel_downloads: self
                .max_parallel_downloads
                .unwrap_or(DEFAULT_MAX_PARALLEL_DOWNLOADS),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_delay: self.retry_delay.unwrap_or(DEFAULT_RETRY_DELAY),
            require_range_support: self.require_range_support,
        };
        config.validate()?;
        Ok(config)
    }
}
