use std::fmt;

use crate::errors::{AppError, AppResult};

/// Longest identifier accepted, in characters
pub const MAX_IDENTIFIER_LEN: usize = 32;

/// Error message returned to clients for any identifier that fails validation
pub const INVALID_IDENTIFIER_MESSAGE: &str = "invalid video id";

/// Validated upstream image identifier
///
/// Only ever hashed into cache paths and percent-encoded into upstream URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThumbnailId(String);

impl ThumbnailId {
    /// Trim surrounding whitespace and check the identifier is non-empty and
    /// at most [`MAX_IDENTIFIER_LEN`] characters.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_IDENTIFIER_LEN {
            return Err(AppError::validation(INVALID_IDENTIFIER_MESSAGE));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThumbnailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ThumbnailId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
