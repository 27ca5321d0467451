//! Upstream thumbnail retrieval with a two-tier fallback
//!
//! The primary template points at the high resolution asset, which does not
//! exist for every identifier. The fallback template points at a lower
//! resolution asset that nearly always exists.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::fmt;
use tracing::{debug, warn};

use super::identifier::ThumbnailId;
use crate::config::{UpstreamConfig, defaults::ID_PLACEHOLDER};
use crate::errors::{AppResult, FetchError, FetchResult};

/// Which upstream URL produced (or failed to produce) an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamTier {
    Primary,
    Fallback,
}

impl UpstreamTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for UpstreamTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw bytes fetched from upstream, not yet decoded
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub tier: UpstreamTier,
    pub url: String,
}

/// Source of raw thumbnail bytes for an identifier
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Fetch raw image bytes, or `FetchError::AllSourcesFailed` when no tier
    /// could deliver them.
    async fn fetch(&self, id: &ThumbnailId) -> FetchResult<FetchedImage>;
}

/// HTTP implementation of [`ThumbnailSource`] over `reqwest`
#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
    primary_url_template: String,
    fallback_url_template: String,
    max_image_bytes: usize,
}

impl UpstreamFetcher {
    /// Build the shared client with the configured timeout and user agent
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            primary_url_template: config.primary_url_template.clone(),
            fallback_url_template: config.fallback_url_template.clone(),
            max_image_bytes: config.max_image_bytes,
        })
    }

    /// Upstream URL for a tier with the identifier percent-encoded
    pub fn url_for(&self, tier: UpstreamTier, id: &ThumbnailId) -> String {
        let template = match tier {
            UpstreamTier::Primary => &self.primary_url_template,
            UpstreamTier::Fallback => &self.fallback_url_template,
        };
        template.replace(ID_PLACEHOLDER, &urlencoding::encode(id.as_str()))
    }

    async fn fetch_tier(&self, tier: UpstreamTier, id: &ThumbnailId) -> FetchResult<FetchedImage> {
        let url = self.url_for(tier, id);
        debug!("Fetching {} thumbnail from {}", tier, url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Request {
                tier,
                url: url.clone(),
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                tier,
                url,
                status: status.as_u16(),
            });
        }

        if let Some(length) = response.content_length()
            && length > self.max_image_bytes as u64
        {
            return Err(FetchError::TooLarge {
                tier,
                url,
                size: usize::try_from(length).unwrap_or(usize::MAX),
                max_size: self.max_image_bytes,
            });
        }

        let bytes = response.bytes().await.map_err(|e| FetchError::Request {
            tier,
            url: url.clone(),
            message: e.without_url().to_string(),
        })?;

        if bytes.len() > self.max_image_bytes {
            return Err(FetchError::TooLarge {
                tier,
                url,
                size: bytes.len(),
                max_size: self.max_image_bytes,
            });
        }

        debug!("Fetched {} bytes from {} tier", bytes.len(), tier);
        Ok(FetchedImage { bytes, tier, url })
    }
}

#[async_trait]
impl ThumbnailSource for UpstreamFetcher {
    async fn fetch(&self, id: &ThumbnailId) -> FetchResult<FetchedImage> {
        let primary = match self.fetch_tier(UpstreamTier::Primary, id).await {
            Ok(image) => return Ok(image),
            Err(e) => e,
        };
        warn!("Primary thumbnail unavailable for {}, trying fallback: {}", id, primary);

        match self.fetch_tier(UpstreamTier::Fallback, id).await {
            Ok(image) => Ok(image),
            Err(fallback) => {
                warn!("No upstream thumbnail for {}: {}", id, fallback);
                Err(FetchError::AllSourcesFailed {
                    primary: Box::new(primary),
                    fallback: Box::new(fallback),
                })
            }
        }
    }
}
