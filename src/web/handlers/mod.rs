//! HTTP request handlers
//!
//! Handlers stay thin: they extract request data, delegate to the thumbnail
//! service and shape the response.

pub mod health;
pub mod index;
pub mod thumbnails;
