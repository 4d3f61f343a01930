//! HTTP artwork downloader backing notification photo enrichment.

use std::time::Duration;

use async_trait::async_trait;
use wttracker::{ArtworkFetch, Error};

/// Largest artwork payload we are willing to forward to Telegram.
const MAX_ARTWORK_BYTES: usize = 5 * 1024 * 1024;

/// Downloads playlist and track artwork over plain HTTP GET.
pub struct ArtworkClient {
    client: reqwest::Client,
}

impl ArtworkClient {
    /// Create a new artwork client with the given request timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(ArtworkClient { client })
    }
}

#[async_trait]
impl ArtworkFetch for ArtworkClient {
    async fn fetch(&self, url: &str) -> wttracker::Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::enrichment(format!("artwork request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::enrichment(format!(
                "artwork request returned HTTP {}",
                response.status().as_u16()
            )));
        }

        if let Some(length) = response.content_length() {
            if length as usize > MAX_ARTWORK_BYTES {
                return Err(Error::enrichment(format!(
                    "artwork too large: {} bytes",
                    length
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::enrichment(format!("artwork download failed: {}", e)))?;

        if bytes.len() > MAX_ARTWORK_BYTES {
            return Err(Error::enrichment(format!(
                "artwork too large: {} bytes",
                bytes.len()
            )));
        }

        Ok(bytes.to_vec())
    }
}
