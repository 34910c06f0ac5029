// Bounded retry with exponential backoff, shared by the range and fallback
// download paths.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::DownloadError;

/// Retry budget for one operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; 0 means a single attempt.
    pub max_retries: u32,
    /// Delay before the first retry. Doubles after every failed attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay slept after failed attempt `attempt` (0-indexed).
    ///
    /// `base_delay * 2^attempt`, computed with checked arithmetic so large
    /// attempt counts saturate instead of overflowing.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}

/// Run `operation` until it succeeds, the retry budget is spent, or
/// `should_retry` rejects the error.
///
/// `operation` receives the current attempt number (0-indexed) and runs at
/// least once. An error that `should_retry` rejects propagates immediately
/// without a further attempt. The inter-attempt sleep races the cancellation
/// token; cancellation wins and aborts with [`DownloadError::Cancelled`]
/// before another attempt starts.
pub async fn retry_with_backoff<F, Fut, T, P>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    should_retry: P,
    operation: F,
) -> Result<T, DownloadError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, DownloadError>>,
    P: Fn(&DownloadError) -> bool,
{
    let mut attempt = 0u32;
    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_retries || !should_retry(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retrying after transient error"
                );
                tokio::select! {
                    _ = token.cancelled() => return Err(DownloadError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1))
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(1));
        assert_eq!(
            policy.delay_for_attempt(31),
            Duration::from_secs(1u64 << 31)
        );
        // Shift widths past the multiplier's range saturate rather than panic.
        assert_eq!(
            policy.delay_for_attempt(64),
            Duration::from_secs(u64::from(u32::MAX))
        );
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let token = CancellationToken::new();
        let result =
            retry_with_backoff(&fast_policy(3), &token, |_| true, |_| async { Ok(42u32) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn persistent_failure_spends_the_whole_budget() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(3), &token, |_| true, |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async { Err(DownloadError::network("connection reset")) }
        })
        .await;
        assert!(matches!(result, Err(DownloadError::Network { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn zero_retries_means_one_attempt() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(0), &token, |_| true, |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async { Err(DownloadError::network("timeout")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn rejected_errors_propagate_without_retry() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(
            &fast_policy(5),
            &token,
            DownloadError::is_retryable,
            |_| {
                attempts.fetch_add(1, Ordering::Relaxed);
                async {
                    Err(DownloadError::ChunkSizeMismatch {
                        expected: 100,
                        actual: 50,
                        range_header: "bytes=0-99".to_string(),
                    })
                }
            },
        )
        .await;
        assert!(matches!(result, Err(DownloadError::ChunkSizeMismatch { .. })));
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(&fast_policy(3), &token, |_| true, |attempt| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 2 {
                    Err(DownloadError::network("flaky"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_the_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast_policy(3), &token, |_| true, |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(result, Err(DownloadError::Cancelled)));
        assert_eq!(attempts.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn cancellation_preempts_the_backoff_sleep() {
        let policy = RetryPolicy::new(3, Duration::from_secs(3600));
        let token = CancellationToken::new();
        let attempts = AtomicU32::new(0);

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let result: Result<(), _> = retry_with_backoff(&policy, &token, |_| true, |_| {
            attempts.fetch_add(1, Ordering::Relaxed);
            async { Err(DownloadError::network("down")) }
        })
        .await;
        assert!(matches!(result, Err(DownloadError::Cancelled)));
        // Cancellation lands inside the first sleep, before any retry.
        assert_eq!(attempts.load(Ordering::Relaxed), 1);
    }
}
