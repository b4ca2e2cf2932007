//! Fetching image bytes over HTTP.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::models::ImageQueueError;

/// Source of image bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageQueueError>;
}

/// Plain HTTP GET fetcher.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a new fetcher.
    ///
    /// # Arguments
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageQueueError> {
        let connection_error = |e: reqwest::Error| ImageQueueError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(connection_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageQueueError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(connection_error)?;
        Ok(bytes.to_vec())
    }
}
