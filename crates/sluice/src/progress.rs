/// Observer for incremental download progress.
///
/// Called once per verified chunk after its bytes are committed to disk, and
/// once with the full length on the single-request fallback path. Reported
/// totals are monotonically non-decreasing; concurrent callbacks may
/// interleave and are not ordered by range position.
///
/// Implementations must return quickly and must not panic; anything slow
/// should hand off to its own queue.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, bytes_downloaded: u64, total_bytes: u64);
}

impl<F> ProgressListener for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn on_progress(&self, bytes_downloaded: u64, total_bytes: u64) {
        self(bytes_downloaded, total_bytes)
    }
}
