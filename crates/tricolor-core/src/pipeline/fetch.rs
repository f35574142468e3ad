//! Fetch job: retrieve the raw bytes of an image over HTTP.
//!
//! The transport sits behind the [`ImageFetcher`] trait so the pipeline can
//! run against any byte source; [`HttpFetcher`] is the `reqwest` client used
//! in production.

use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;

use crate::config::{FetchConfig, LimitsConfig};
use crate::error::PipelineError;
use crate::types::RawImage;

/// Source of image bytes, keyed by URL.
///
/// Uses `async_trait` because the pipeline shares one fetcher between tasks
/// as `Arc<dyn ImageFetcher>`.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetcher name for logging.
    fn name(&self) -> &str;

    /// Retrieve the full body behind `url`.
    async fn fetch(&self, url: &str) -> Result<RawImage, PipelineError>;
}

/// HTTP fetcher backed by a shared `reqwest::Client`.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(fetch: &FetchConfig, limits: &LimitsConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(fetch.user_agent.clone())
            .timeout(Duration::from_millis(fetch.timeout_ms))
            .connect_timeout(Duration::from_millis(fetch.connect_timeout_ms))
            .build()
            .map_err(|e| PipelineError::TaskFailed {
                stage: "fetch".to_string(),
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            max_bytes: limits.max_download_bytes(),
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<RawImage, PipelineError> {
        let download_error = |message: String| PipelineError::Download {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_error(e.to_string()))?;

        if let Some(size) = response.content_length() {
            if size > self.max_bytes {
                return Err(download_error(format!(
                    "body of {size} bytes exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
        }

        let mut bytes = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_error(e.to_string()))?;
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(download_error(format!(
                    "body exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(RawImage {
            url: url.to_string(),
            bytes,
        })
    }
}
