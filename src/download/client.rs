//! HTTP transport used for metadata queries and PDF block retrieval.
//!
//! [`Transport`] is the seam the fetcher and the metadata client depend on;
//! [`HttpClient`] is the reqwest-backed implementation. Each call performs a
//! single GET. Retrying is the caller's job.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use tracing::{debug, instrument};
use url::Url;

use super::DownloadError;
use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::user_agent;

/// Fetches the full body of a URL.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one GET and returns the body bytes.
    ///
    /// # Errors
    ///
    /// Timeouts, transport failures, non-2xx statuses and empty bodies are
    /// reported as [`DownloadError`].
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// Timeouts and identification for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Operator contact appended to the User-Agent.
    pub contact: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            contact: None,
        }
    }
}

/// reqwest-backed [`Transport`].
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, DownloadError> {
        Self::with_settings(&ClientSettings::default())
    }

    /// Creates a client with explicit settings.
    ///
    /// # Errors
    ///
    /// [`DownloadError::ClientBuild`] if the TLS backend cannot be initialised.
    #[instrument(level = "debug", skip(settings), fields(
        connect_ms = settings.connect_timeout.as_millis(),
        read_ms = settings.read_timeout.as_millis(),
    ))]
    pub fn with_settings(settings: &ClientSettings) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.read_timeout)
            .gzip(true)
            .user_agent(user_agent::user_agent_with_contact(
                settings.contact.as_deref(),
            ))
            .build()
            .map_err(DownloadError::client_build)?;
        Ok(Self { client })
    }

    /// Returns the inner reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Fetches `url` and collects the streamed body.
    ///
    /// # Errors
    ///
    /// See [`Transport::get_bytes`].
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.send_request(url).await?;
        let capacity = response
            .content_length()
            .and_then(|len| usize::try_from(len).ok())
            .unwrap_or(0);

        let mut body = Vec::with_capacity(capacity);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::from_reqwest(url, e))?;
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(DownloadError::empty_body(url));
        }
        debug!(bytes = body.len(), "response body received");
        Ok(body)
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DownloadError::invalid_url(url));
        }

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(std::string::ToString::to_string);
            return Err(DownloadError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.fetch_body(url).await
    }
}
