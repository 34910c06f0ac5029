use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chunk::split_ranges;
use crate::client::{HttpClient, ReqwestClient};
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::fetcher::RangeFetcher;
use crate::progress::ProgressListener;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::writer::PositionalWriter;

/// End-to-end orchestration: probe the origin, then either fan out range
/// requests into a pre-sized file or fall back to a single full-body request.
///
/// All state lives inside one [`download`] call; the downloader itself can be
/// reused across calls and shared between tasks. Errors propagate to the
/// caller verbatim.
///
/// [`download`]: Downloader::download
pub struct Downloader {
    client: Arc<dyn HttpClient>,
    config: DownloadConfig,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl Downloader {
    /// Build a downloader backed by the default [`ReqwestClient`].
    pub fn new(config: DownloadConfig) -> Result<Self, DownloadError> {
        Ok(Self::with_client(Arc::new(ReqwestClient::new()?), config))
    }

    /// Build a downloader over any transport; tests inject in-memory fakes.
    pub fn with_client(client: Arc<dyn HttpClient>, config: DownloadConfig) -> Self {
        Self {
            client,
            config,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Download `url` to `output_path`, replacing any existing file.
    pub async fn download(&self, url: &str, output_path: &Path) -> Result<(), DownloadError> {
        self.download_with_token(url, output_path, CancellationToken::new())
            .await
    }

    /// Like [`download`], but wound down cooperatively when `token` is
    /// cancelled: in-flight tasks stop at their next suspension point and
    /// [`DownloadError::Cancelled`] is returned. On any terminal failure the
    /// partially written output file is left in place.
    ///
    /// [`download`]: Downloader::download
    pub async fn download_with_token(
        &self,
        url: &str,
        output_path: &Path,
        token: CancellationToken,
    ) -> Result<(), DownloadError> {
        let metadata = self.client.fetch_metadata(url).await?;

        if !metadata.accepts_ranges {
            if self.config.require_range_support {
                return Err(DownloadError::RangesNotSupported {
                    url: url.to_string(),
                });
            }
            info!(
                url,
                content_length = metadata.content_length,
                "Origin does not advertise byte ranges, downloading in a single request"
            );
            return self
                .download_single(url, output_path, metadata.content_length, &token)
                .await;
        }

        let ranges = split_ranges(metadata.content_length, self.config.chunk_size)?;
        info!(
            url,
            content_length = metadata.content_length,
            chunks = ranges.len(),
            parallel = self.config.max_parallel_downloads,
            "Starting parallel download"
        );

        let writer = Arc::new(PositionalWriter::create(output_path, metadata.content_length).await?);
        let fetcher = Arc::new(RangeFetcher::new(
            Arc::clone(&self.client),
            url,
            metadata.content_length,
            Arc::clone(&writer),
            &self.config,
            self.listener.clone(),
            token,
        ));

        match fetcher.run(ranges).await {
            Ok(()) => {
                writer.close().await?;
                info!(url, path = %output_path.display(), "Download complete");
                Ok(())
            }
            Err(err) => {
                // Flush what we have without masking the download failure.
                if let Err(close_err) = writer.close().await {
                    warn!(
                        path = %output_path.display(),
                        error = %close_err,
                        "Failed to close output file after download error"
                    );
                }
                Err(err)
            }
        }
    }

    /// Fallback for origins without range support: one retried full-body
    /// request, buffered in memory, written out in a single pass.
    async fn download_single(
        &self,
        url: &str,
        output_path: &Path,
        content_length: u64,
        token: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_delay);
        let bytes = retry_with_backoff(&policy, token, DownloadError::is_retryable, |_attempt| {
            self.client.download_full(url)
        })
        .await?;

        if let Some(listener) = &self.listener {
            listener.on_progress(bytes.len() as u64, content_length);
        }

        tokio::fs::write(output_path, &bytes).await.map_err(|e| {
            DownloadError::file_write(format!("failed to write {}", output_path.display()), e)
        })?;
        info!(url, path = %output_path.display(), "Download complete");
        Ok(())
    }
}
