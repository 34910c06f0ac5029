use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::chunk::ByteRange;
use crate::error::DownloadError;

pub const DEFAULT_USER_AGENT: &str = concat!("sluice/", env!("CARGO_PKG_VERSION"));

/// What a metadata probe learned about a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    /// Total size in bytes, always at least 1.
    pub content_length: u64,
    /// Whether the origin advertises `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
}

/// The narrow transport surface the download core consumes.
///
/// The core never touches a transport library directly; tests substitute
/// in-memory fakes. Dropping an implementation releases its transport
/// resources.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Probe the origin (semantically a HEAD request). A missing or invalid
    /// `Content-Length` is a [`DownloadError::Network`] failure.
    async fn fetch_metadata(&self, url: &str) -> Result<FileMetadata, DownloadError>;

    /// Fetch one byte range. Only HTTP 206 is accepted; the whole body is
    /// returned.
    async fn download_range(&self, url: &str, range: ByteRange) -> Result<Bytes, DownloadError>;

    /// Fetch the entire file in one request. Only HTTP 200 is accepted.
    async fn download_full(&self, url: &str) -> Result<Bytes, DownloadError>;
}

/// Transport options for [`ReqwestClient`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Overall per-request timeout; zero disables it.
    pub timeout: Duration,

    /// Time allowed to establish the initial connection; zero disables it.
    pub connect_timeout: Duration,

    /// Whether to follow redirects (up to 10 hops).
    pub follow_redirects: bool,

    pub user_agent: String,

    /// Extra headers sent with every request.
    pub headers: HeaderMap,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        Self {
            // No overall timeout: large bodies take as long as they take.
            // Stalls surface through the connect timeout and the origin.
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers,
        }
    }
}

/// Production [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_config(&HttpConfig::default())
    }

    pub fn with_config(config: &HttpConfig) -> Result<Self, DownloadError> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(config.headers.clone())
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            });

        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }
        if !config.connect_timeout.is_zero() {
            builder = builder.connect_timeout(config.connect_timeout);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::network_caused_by("failed to build HTTP client", e))?;
        Ok(Self { client })
    }
}

/// Parse the required `Content-Length` response header.
fn parse_content_length(headers: &HeaderMap) -> Result<u64, DownloadError> {
    let value = headers
        .get(CONTENT_LENGTH)
        .ok_or_else(|| DownloadError::network("response is missing Content-Length"))?;
    let text = value
        .to_str()
        .map_err(|_| DownloadError::network("Content-Length is not valid ASCII"))?;
    let length: u64 = text
        .trim()
        .parse()
        .map_err(|_| DownloadError::network(format!("invalid Content-Length `{text}`")))?;
    if length == 0 {
        return Err(DownloadError::network("origin reports a zero-length file"));
    }
    Ok(length)
}

/// True iff `Accept-Ranges` contains the token `bytes`, case-insensitively.
/// An absent header or any other value means ranges are unsupported.
fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get(ACCEPT_RANGES)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("bytes"))
        })
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn fetch_metadata(&self, url: &str) -> Result<FileMetadata, DownloadError> {
        let response = self.client.head(url).send().await.map_err(|e| {
            DownloadError::network_caused_by(format!("metadata probe failed for {url}"), e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::network(format!(
                "metadata probe for {url} returned HTTP {status}"
            )));
        }

        let content_length = parse_content_length(response.headers())?;
        let accepts_ranges = accepts_byte_ranges(response.headers());
        debug!(url, content_length, accepts_ranges, "Probed file metadata");
        Ok(FileMetadata {
            content_length,
            accepts_ranges,
        })
    }

    async fn download_range(&self, url: &str, range: ByteRange) -> Result<Bytes, DownloadError> {
        let range_header = range.to_range_header();
        let response = self
            .client
            .get(url)
            .header(RANGE, &range_header)
            .send()
            .await
            .map_err(|e| {
                DownloadError::network_caused_by(
                    format!("range request {range_header} failed for {url}"),
                    e,
                )
            })?;

        let status = response.status();
        if status != StatusCode::PARTIAL_CONTENT {
            return Err(DownloadError::network(format!(
                "range request {range_header} for {url} returned HTTP {status}, expected 206"
            )));
        }

        response.bytes().await.map_err(|e| {
            DownloadError::network_caused_by(format!("failed to read range body from {url}"), e)
        })
    }

    async fn download_full(&self, url: &str) -> Result<Bytes, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            DownloadError::network_caused_by(format!("request failed for {url}"), e)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DownloadError::network(format!(
                "request for {url} returned HTTP {status}, expected 200"
            )));
        }

        response.bytes().await.map_err(|e| {
            DownloadError::network_caused_by(format!("failed to read body from {url}"), e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(name: reqwest::header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn content_length_is_required_and_positive() {
        assert!(parse_content_length(&HeaderMap::new()).is_err());
        assert!(parse_content_length(&headers_with(CONTENT_LENGTH, "0")).is_err());
        assert!(parse_content_length(&headers_with(CONTENT_LENGTH, "abc")).is_err());
        assert!(parse_content_length(&headers_with(CONTENT_LENGTH, "-5")).is_err());
        assert_eq!(
            parse_content_length(&headers_with(CONTENT_LENGTH, "5000")).unwrap(),
            5000
        );
    }

    #[test]
    fn accept_ranges_token_is_case_insensitive() {
        assert!(accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "bytes")));
        assert!(accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "BYTES")));
        assert!(accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "Bytes")));
        assert!(accepts_byte_ranges(&headers_with(
            ACCEPT_RANGES,
            "none, bytes"
        )));
    }

    #[test]
    fn other_accept_ranges_values_mean_unsupported() {
        assert!(!accepts_byte_ranges(&HeaderMap::new()));
        assert!(!accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "none")));
        assert!(!accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "byte")));
        assert!(!accepts_byte_ranges(&headers_with(ACCEPT_RANGES, "bytess")));
    }
}
