//! # HTTP Access
//!
//! This module wraps the `reqwest` client used for every network call the
//! scraper makes: the existence probe before a product page is opened, the
//! catalog feed download, the page snapshot fetch and asset downloads.
//!
//! ## Failure Classification
//!
//! Every failure is mapped onto a [`FetchError`] variant so callers can log a
//! precise reason:
//! - **Timeout**: the fixed request timeout elapsed
//! - **Connection**: DNS, TLS or socket failure before a response arrived
//! - **Status**: the server answered with a non-success status
//! - **Io**: the response body could not be written to disk
//!
//! Nothing in this module retries. A failed request is reported once and the
//! caller decides whether the product or asset is skipped. A download that
//! fails after the destination file was created removes that file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

/// Browser-like user agent; the catalog rejects obvious bot agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/92.0.4515.159 Safari/537.36";

/// Fixed upper bound for every request, including streamed downloads.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Response body exposed as a buffered async reader.
pub type BodyReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Classified HTTP failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout connection: {url}")]
    Timeout { url: String },

    #[error("no connection to {url}")]
    Connection { url: String },

    #[error("not found: {url} (status {status})")]
    Status { url: String, status: u16 },

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request to {url} failed: {source}")]
    Other {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn classify(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connection { url }
        } else if let Some(status) = err.status() {
            Self::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            Self::Other { url, source: err }
        }
    }
}

/// The HTTP capability the pipeline depends on.
///
/// The production implementation is [`HttpClient`]; tests substitute an
/// in-memory fetcher so no network is touched.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues a GET and validates the status without reading the body.
    async fn check(&self, url: &str) -> Result<(), FetchError>;

    /// Issues a GET and returns the body decoded as text.
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Issues a GET and hands back the body as it arrives, for documents too
    /// large to buffer whole (the catalog feed).
    async fn open_stream(&self, url: &str) -> Result<BodyReader, FetchError>;

    /// Streams the response body of a GET into `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// `reqwest`-backed [`Fetcher`].
///
/// ## Request Defaults
///
/// - `User-Agent`: [`USER_AGENT`]
/// - `Accept`: `application/xml; charset=utf-8`, which the catalog API needs
///   to answer in XML rather than JSON
/// - Timeout: [`REQUEST_TIMEOUT`]
///
/// The client is cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds the client with the catalog's default headers.
    ///
    /// # Errors
    ///
    /// Fails only if the TLS backend cannot be initialised.
    pub fn new() -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn check(&self, url: &str) -> Result<(), FetchError> {
        self.get(url).await.map(|_| ())
    }

    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| FetchError::classify(url, e))
    }

    async fn open_stream(&self, url: &str) -> Result<BodyReader, FetchError> {
        let body = self
            .get(url)
            .await?
            .bytes_stream()
            .map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(body))))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.get(url).await?;

        match write_body(url, response, dest).await {
            Ok(written) => {
                debug!("Downloaded {} bytes from {} to {}", written, url, dest.display());
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(dest).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to remove partial download {}: {}", dest.display(), rm);
                }
                Err(e)
            }
        }
    }
}

async fn write_body(url: &str, mut response: Response, dest: &Path) -> Result<u64, FetchError> {
    let io_err = |source| FetchError::Io {
        path: dest.display().to_string(),
        source,
    };
    let mut file = File::create(dest).await.map_err(io_err)?;

    let mut written = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| FetchError::classify(url, e))?
    {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;

    Ok(written)
}
