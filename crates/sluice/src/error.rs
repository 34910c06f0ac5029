use std::io;

/// Closed failure taxonomy for a download.
///
/// Call sites match exhaustively; the retry layer is the only place a
/// transient [`DownloadError::Network`] is absorbed.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("download cancelled")]
    Cancelled,

    #[error("origin does not support byte ranges: {url}")]
    RangesNotSupported { url: String },

    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("range {range_header} returned {actual} bytes, expected {expected}")]
    ChunkSizeMismatch {
        expected: u64,
        actual: u64,
        range_header: String,
    },

    #[error("file write error: {message}")]
    FileWrite {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

impl DownloadError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_caused_by(message: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn file_write(message: impl Into<String>, source: io::Error) -> Self {
        Self::FileWrite {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Whether another attempt at the failed operation could succeed.
    ///
    /// Only transport-level faults qualify. A wrong-length 206 body means the
    /// server is misbehaving, not that the network hiccuped, so
    /// [`DownloadError::ChunkSizeMismatch`] is not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
