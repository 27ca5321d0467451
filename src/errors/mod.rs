//! Centralized error handling for the thumbnail proxy
//!
//! Errors are split by layer so each failure keeps the context needed to
//! decide how it is handled:
//!
//! - **Application Errors** (`AppError`): validation and configuration
//!   problems that surface to callers or abort startup
//! - **Fetch Errors** (`FetchError`): upstream failures, recovered by serving
//!   the blank placeholder
//! - **Normalize Errors** (`NormalizeError`): undecodable upstream bytes,
//!   recovered the same way
//! - **Cache Write Errors** (`CacheWriteError`): disk failures, logged and
//!   never returned to a client
//!
//! # Usage
//!
//! ```rust
//! use thumb_proxy::errors::{AppError, AppResult};
//!
//! fn example_function(size: u32) -> AppResult<u32> {
//!     if size == 0 {
//!         return Err(AppError::validation("size must be positive"));
//!     }
//!     Ok(size)
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for upstream fetch Results
pub type FetchResult<T> = Result<T, FetchError>;
