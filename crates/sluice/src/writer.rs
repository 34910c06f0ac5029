use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::DownloadError;

/// Shared sink for verified chunks, each addressed by its absolute offset.
///
/// The output file is created (or truncated) and sized to the full content
/// length up front, so every range task can write its bytes directly into
/// place. A mutex serializes seek-and-write pairs on the shared handle; no
/// two writes interleave and no byte is written twice as long as callers
/// write disjoint ranges.
pub struct PositionalWriter {
    file: Mutex<File>,
    path: PathBuf,
}

impl PositionalWriter {
    /// Open `path` for writing, truncating any existing file, and size it to
    /// exactly `total_bytes`.
    pub async fn create(path: &Path, total_bytes: u64) -> Result<Self, DownloadError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await
            .map_err(|e| {
                DownloadError::file_write(format!("failed to create {}", path.display()), e)
            })?;

        file.set_len(total_bytes).await.map_err(|e| {
            DownloadError::file_write(
                format!("failed to size {} to {total_bytes} bytes", path.display()),
                e,
            )
        })?;

        debug!(path = %path.display(), total_bytes, "Pre-sized output file");
        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Write `bytes` in full at `offset`. Safe to call from many tasks.
    pub async fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<(), DownloadError> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await.map_err(|e| {
            DownloadError::file_write(
                format!("failed to seek to {offset} in {}", self.path.display()),
                e,
            )
        })?;
        file.write_all(bytes).await.map_err(|e| {
            DownloadError::file_write(
                format!(
                    "failed to write {} bytes at {offset} in {}",
                    bytes.len(),
                    self.path.display()
                ),
                e,
            )
        })
    }

    /// Flush buffered writes and sync the file to disk. The handle itself is
    /// released on drop.
    pub async fn close(&self) -> Result<(), DownloadError> {
        let mut file = self.file.lock().await;
        file.flush().await.map_err(|e| {
            DownloadError::file_write(format!("failed to flush {}", self.path.display()), e)
        })?;
        file.sync_all().await.map_err(|e| {
            DownloadError::file_write(format!("failed to sync {}", self.path.display()), e)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
