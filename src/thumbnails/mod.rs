//! Thumbnail pipeline: identifier validation, upstream fetch, square PNG
//! normalization and the on-disk TTL cache.

pub mod cache;
pub mod fetcher;
pub mod identifier;
pub mod normalizer;
pub mod service;

pub use cache::ThumbnailCache;
pub use fetcher::{FetchedImage, ThumbnailSource, UpstreamFetcher, UpstreamTier};
pub use identifier::{INVALID_IDENTIFIER_MESSAGE, MAX_IDENTIFIER_LEN, ThumbnailId};
pub use normalizer::ImageNormalizer;
pub use service::{PlaceholderReason, ThumbnailOutcome, ThumbnailService};
