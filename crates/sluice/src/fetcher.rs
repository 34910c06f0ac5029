// Bounded-concurrency scheduler for the parallel range phase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::chunk::ByteRange;
use crate::client::HttpClient;
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::progress::ProgressListener;
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::writer::PositionalWriter;

/// Shared state for one parallel range phase.
///
/// One task per range runs inside a [`JoinSet`] scoped to [`run`]; a counting
/// semaphore keeps at most `max_parallel_downloads` requests in flight, which
/// also bounds live chunk buffers to the same count. The first error that
/// escapes retry cancels the token, siblings wind down at their next
/// suspension point, and that error propagates unchanged.
///
/// [`run`]: RangeFetcher::run
pub(crate) struct RangeFetcher {
    client: Arc<dyn HttpClient>,
    url: String,
    total_bytes: u64,
    writer: Arc<PositionalWriter>,
    policy: RetryPolicy,
    semaphore: Arc<Semaphore>,
    progress: AtomicU64,
    listener: Option<Arc<dyn ProgressListener>>,
    token: CancellationToken,
}

impl RangeFetcher {
    pub(crate) fn new(
        client: Arc<dyn HttpClient>,
        url: &str,
        total_bytes: u64,
        writer: Arc<PositionalWriter>,
        config: &DownloadConfig,
        listener: Option<Arc<dyn ProgressListener>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            client,
            url: url.to_string(),
            total_bytes,
            writer,
            policy: RetryPolicy::new(config.max_retries, config.retry_delay),
            semaphore: Arc::new(Semaphore::new(config.max_parallel_downloads)),
            progress: AtomicU64::new(0),
            listener,
            token,
        }
    }

    /// Download every range and write it into place. Returns only after all
    /// spawned tasks have finished; no task outlives this call.
    pub(crate) async fn run(self: Arc<Self>, ranges: Vec<ByteRange>) -> Result<(), DownloadError> {
        let mut tasks = JoinSet::new();
        for range in ranges {
            let fetcher = Arc::clone(&self);
            tasks.spawn(async move { fetcher.fetch_range(range).await });
        }

        let mut first_error: Option<DownloadError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                // Siblings that observed cancellation after the first real
                // failure; the failure itself is what surfaces.
                Ok(Err(DownloadError::Cancelled)) => {}
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        self.token.cancel();
                        first_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if join_err.is_panic() {
                        self.token.cancel();
                        // Drain remaining tasks before re-raising the panic.
                        while tasks.join_next().await.is_some() {}
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }
        if self.token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        Ok(())
    }

    async fn fetch_range(&self, range: ByteRange) -> Result<(), DownloadError> {
        let _permit = tokio::select! {
            _ = self.token.cancelled() => return Err(DownloadError::Cancelled),
            permit = self.semaphore.acquire() => {
                permit.map_err(|_| DownloadError::Cancelled)?
            }
        };
        trace!(start = range.start, end = range.end, "Fetching range");

        let bytes = retry_with_backoff(
            &self.policy,
            &self.token,
            DownloadError::is_retryable,
            |_attempt| self.client.download_range(&self.url, range),
        )
        .await?;

        let actual = bytes.len() as u64;
        if actual != range.length() {
            return Err(DownloadError::ChunkSizeMismatch {
                expected: range.length(),
                actual,
                range_header: range.to_range_header(),
            });
        }

        // A sibling may have failed while this request was in flight; do not
        // touch the file once the phase is winding down.
        if self.token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        self.writer.write_at(range.start, &bytes).await?;
        drop(bytes);

        let new_total = self.progress.fetch_add(actual, Ordering::SeqCst) + actual;
        if let Some(listener) = &self.listener {
            listener.on_progress(new_total, self.total_bytes);
        }
        debug!(
            start = range.start,
            end = range.end,
            downloaded = new_total,
            total = self.total_bytes,
            "Chunk committed"
        );
        Ok(())
    }
}
