//! Error type definitions for the thumbnail proxy

use std::path::PathBuf;
use thiserror::Error;

use crate::thumbnails::UpstreamTier;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Client supplied input that fails validation
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Upstream fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connection, timeout or body read failures
    #[error("{tier} request to {url} failed: {message}")]
    Request {
        tier: UpstreamTier,
        url: String,
        message: String,
    },

    /// Upstream answered with a non-success status
    #[error("{tier} request to {url} returned HTTP {status}")]
    Status {
        tier: UpstreamTier,
        url: String,
        status: u16,
    },

    /// Upstream body exceeded the configured limit
    #[error("{tier} response from {url} is {size} bytes (max: {max_size})")]
    TooLarge {
        tier: UpstreamTier,
        url: String,
        size: usize,
        max_size: usize,
    },

    /// Both the primary and the fallback source failed
    #[error("all upstream sources failed (primary: {primary}; fallback: {fallback})")]
    AllSourcesFailed {
        primary: Box<FetchError>,
        fallback: Box<FetchError>,
    },
}

/// Image normalization errors
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Bytes are not a raster image the decoder understands
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Image decoded but has no pixels to crop
    #[error("Decoded image is empty ({width}x{height})")]
    Empty { width: u32, height: u32 },

    /// PNG encoding failed
    #[error("Failed to encode PNG: {0}")]
    Encode(#[source] image::ImageError),
}

/// Cache persistence errors, swallowed by the cache writer after logging
#[derive(Error, Debug)]
pub enum CacheWriteError {
    #[error("Failed to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write temporary cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move cache file into place at {path}: {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl FetchError {
    /// Tier that produced this error, `None` for the combined failure
    pub fn tier(&self) -> Option<UpstreamTier> {
        match self {
            Self::Request { tier, .. } | Self::Status { tier, .. } | Self::TooLarge { tier, .. } => {
                Some(*tier)
            }
            Self::AllSourcesFailed { .. } => None,
        }
    }
}
