//! HTTP transport capability.
//!
//! The pipeline only needs "issue GET, stream bytes". [`HttpTransport`] is
//! that capability; [`ReqwestTransport`] is the production implementation and
//! tests substitute in-memory fakes.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::time::Duration;
use thiserror::Error;

const APP_USER_AGENT: &str = concat!("appboot/", env!("CARGO_PKG_VERSION"));

/// Connection establishment deadline for every request.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A transport-level failure, carrying the transport's error text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Human-readable error text
    pub message: String,
}

impl TransportError {
    /// Create a transport error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::new(error.to_string())
    }
}

/// Response body of a successful GET.
pub struct HttpBody {
    /// Total size announced by the server, if any
    pub content_length: Option<u64>,
    /// Body chunks in arrival order
    pub chunks: BoxStream<'static, Result<Vec<u8>, TransportError>>,
}

impl HttpBody {
    /// Build a body from a fixed byte buffer, split into `chunk_size` pieces.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>, chunk_size: usize) -> Self {
        let content_length = Some(bytes.len() as u64);
        let chunks: Vec<Result<Vec<u8>, TransportError>> =
            bytes.chunks(chunk_size.max(1)).map(|chunk| Ok(chunk.to_vec())).collect();
        Self {
            content_length,
            chunks: futures::stream::iter(chunks).boxed(),
        }
    }

    /// Drain the body into a single buffer.
    pub async fn collect(mut self) -> Result<Vec<u8>, TransportError> {
        let mut buffer = Vec::with_capacity(self.content_length.unwrap_or(0) as usize);
        while let Some(chunk) = self.chunks.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer)
    }
}

/// Capability to issue a GET request and stream the response body.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET for `url`. Non-success statuses are errors.
    async fn get(&self, url: &str) -> Result<HttpBody, TransportError>;
}

/// [`HttpTransport`] backed by a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the bootstrapper's user agent and connect timeout.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpBody, TransportError> {
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(format!("HTTP {status} for {url}")));
        }

        let content_length = response.content_length();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from))
            .boxed();

        Ok(HttpBody {
            content_length,
            chunks,
        })
    }
}
