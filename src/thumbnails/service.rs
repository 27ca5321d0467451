//! Request orchestration: validate, serve from cache, or fetch and normalize
//!
//! Upstream and decoding failures never surface as errors. They resolve to
//! [`ThumbnailOutcome::Placeholder`] so the HTTP layer can always answer with
//! an image; only identifier validation produces an `Err`.

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::cache::ThumbnailCache;
use super::fetcher::{ThumbnailSource, UpstreamFetcher, UpstreamTier};
use super::identifier::ThumbnailId;
use super::normalizer::ImageNormalizer;
use crate::config::Config;
use crate::errors::{AppError, AppResult, NormalizeError};
use crate::observability::ThumbnailMetrics;

/// Why the blank placeholder was served instead of a real thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderReason {
    /// Neither upstream tier returned usable bytes
    UpstreamUnavailable,
    /// Upstream bytes were not a decodable image
    Undecodable,
    /// Encoding or the blocking task failed
    ProcessingFailed,
}

/// Result of a thumbnail lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// Fresh cache entry served without touching upstream
    Cached { bytes: Bytes },
    /// Fetched, normalized, and (best-effort) written to the cache
    Fresh { bytes: Bytes, tier: UpstreamTier },
    /// Shared transparent placeholder, never cached
    Placeholder {
        bytes: Bytes,
        reason: PlaceholderReason,
    },
}

impl ThumbnailOutcome {
    pub fn bytes(&self) -> &Bytes {
        match self {
            Self::Cached { bytes } | Self::Fresh { bytes, .. } | Self::Placeholder { bytes, .. } => {
                bytes
            }
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Cached { bytes } | Self::Fresh { bytes, .. } | Self::Placeholder { bytes, .. } => {
                bytes
            }
        }
    }

    /// Whether clients may cache the response
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::Placeholder { .. })
    }

    /// Metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cached { .. } => "cached",
            Self::Fresh { .. } => "fresh",
            Self::Placeholder { .. } => "placeholder",
        }
    }
}

pub struct ThumbnailService {
    source: Arc<dyn ThumbnailSource>,
    cache: ThumbnailCache,
    normalizer: ImageNormalizer,
    placeholder: Bytes,
    metrics: ThumbnailMetrics,
}

impl ThumbnailService {
    pub fn new(
        source: Arc<dyn ThumbnailSource>,
        cache: ThumbnailCache,
        normalizer: ImageNormalizer,
        metrics: ThumbnailMetrics,
    ) -> AppResult<Self> {
        let placeholder = normalizer
            .blank()
            .map_err(|e| AppError::internal(format!("Failed to render placeholder: {e}")))?;

        Ok(Self {
            source,
            cache,
            normalizer,
            placeholder: Bytes::from(placeholder),
            metrics,
        })
    }

    /// Wire the HTTP upstream fetcher and on-disk cache from configuration
    pub fn from_config(config: &Config, metrics: ThumbnailMetrics) -> AppResult<Self> {
        let fetcher = UpstreamFetcher::new(&config.upstream)?;
        Self::new(
            Arc::new(fetcher),
            ThumbnailCache::from_config(config),
            ImageNormalizer::new(config.thumbnail.size),
            metrics,
        )
    }

    pub fn size(&self) -> u32 {
        self.normalizer.size()
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn placeholder(&self) -> Bytes {
        self.placeholder.clone()
    }

    /// Resolve a raw identifier to PNG bytes.
    ///
    /// Returns `AppError::Validation` for an invalid identifier; every other
    /// failure resolves to a placeholder outcome.
    pub async fn get_thumbnail(&self, raw_id: &str) -> AppResult<ThumbnailOutcome> {
        let id = match ThumbnailId::parse(raw_id) {
            Ok(id) => id,
            Err(e) => {
                self.metrics.record_request("invalid");
                return Err(e);
            }
        };

        let path = self.cache.cache_path(&id);
        if self.cache.is_fresh(&path).await {
            match self.cache.read(&path).await {
                Ok(bytes) => {
                    debug!("Serving cached thumbnail for {} from {}", id, path.display());
                    let outcome = ThumbnailOutcome::Cached {
                        bytes: Bytes::from(bytes),
                    };
                    self.metrics.record_request(outcome.label());
                    return Ok(outcome);
                }
                Err(e) => warn!(
                    "Cached thumbnail {} could not be read, refetching: {}",
                    path.display(),
                    e
                ),
            }
        }

        let started = Instant::now();
        let outcome = self.fetch_and_normalize(&id, &path).await;
        self.metrics
            .record_pipeline_duration(started.elapsed().as_secs_f64(), outcome.label());
        self.metrics.record_request(outcome.label());
        Ok(outcome)
    }

    async fn fetch_and_normalize(&self, id: &ThumbnailId, path: &Path) -> ThumbnailOutcome {
        let fetched = match self.source.fetch(id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                info!("Serving placeholder for {}: {}", id, e);
                return self.placeholder_outcome(PlaceholderReason::UpstreamUnavailable);
            }
        };

        let tier = fetched.tier;
        if tier == UpstreamTier::Fallback {
            self.metrics.record_upstream_fallback();
        }

        let normalizer = self.normalizer;
        let raw = fetched.bytes;
        let normalized = match tokio::task::spawn_blocking(move || normalizer.normalize(&raw)).await {
            Ok(Ok(png)) => Bytes::from(png),
            Ok(Err(e @ NormalizeError::Encode(_))) => {
                error!("Failed to encode thumbnail for {}: {}", id, e);
                return self.placeholder_outcome(PlaceholderReason::ProcessingFailed);
            }
            Ok(Err(e)) => {
                info!(
                    "Serving placeholder for {}: {} image from {} is unusable: {}",
                    id, tier, fetched.url, e
                );
                return self.placeholder_outcome(PlaceholderReason::Undecodable);
            }
            Err(e) => {
                error!("Thumbnail normalization task for {} failed: {}", id, e);
                return self.placeholder_outcome(PlaceholderReason::ProcessingFailed);
            }
        };

        if !self.cache.store(path, &normalized).await {
            self.metrics.record_cache_write_failure();
        }

        debug!("Normalized {} thumbnail for {} ({} bytes)", tier, id, normalized.len());
        ThumbnailOutcome::Fresh {
            bytes: normalized,
            tier,
        }
    }

    fn placeholder_outcome(&self, reason: PlaceholderReason) -> ThumbnailOutcome {
        ThumbnailOutcome::Placeholder {
            bytes: self.placeholder.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchError;
    use crate::thumbnails::fetcher::{FetchedImage, MockThumbnailSource};
    use filetime::FileTime;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const SIZE: u32 = 16;
    const TTL: Duration = Duration::from_secs(100);

    fn service_with(source: MockThumbnailSource, cache_dir: &Path) -> ThumbnailService {
        ThumbnailService::new(
            Arc::new(source),
            ThumbnailCache::new(cache_dir.to_path_buf(), SIZE, TTL),
            ImageNormalizer::new(SIZE),
            ThumbnailMetrics::global(),
        )
        .unwrap()
    }

    fn jpeg_bytes(width: u32, height: u32) -> Bytes {
        let image = RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        Bytes::from(bytes)
    }

    fn fetched(bytes: Bytes, tier: UpstreamTier) -> FetchedImage {
        FetchedImage {
            bytes,
            tier,
            url: format!("https://img.example/{tier}.jpg"),
        }
    }

    fn all_failed() -> FetchError {
        FetchError::AllSourcesFailed {
            primary: Box::new(FetchError::Status {
                tier: UpstreamTier::Primary,
                url: "https://img.example/maxres.jpg".to_string(),
                status: 404,
            }),
            fallback: Box::new(FetchError::Status {
                tier: UpstreamTier::Fallback,
                url: "https://img.example/hq.jpg".to_string(),
                status: 404,
            }),
        }
    }

    fn cache_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_invalid_identifier_never_reaches_upstream() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source.expect_fetch().times(0);
        let service = service_with(source, dir.path());

        let too_long = "x".repeat(33);
        for raw in ["", "   ", too_long.as_str()] {
            let error = service.get_thumbnail(raw).await.unwrap_err();
            assert!(matches!(error, AppError::Validation { .. }));
        }
        assert_eq!(cache_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_fresh_cache_hit_skips_upstream() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source.expect_fetch().times(0);
        let service = service_with(source, dir.path());

        let id = ThumbnailId::parse("abc123").unwrap();
        let path = service.cache().cache_path(&id);
        std::fs::write(&path, b"cached png bytes").unwrap();

        // surrounding whitespace resolves to the same entry
        let outcome = service.get_thumbnail("  abc123 ").await.unwrap();

        assert_eq!(
            outcome,
            ThumbnailOutcome::Cached {
                bytes: Bytes::from_static(b"cached png bytes")
            }
        );
        assert!(outcome.is_cacheable());
    }

    #[tokio::test]
    async fn test_miss_fetches_normalizes_and_caches() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .withf(|id| id.as_str() == "fresh1")
            .times(1)
            .returning(|_| Ok(fetched(jpeg_bytes(48, 27), UpstreamTier::Primary)));
        let service = service_with(source, dir.path());

        let first = service.get_thumbnail("fresh1").await.unwrap();
        let ThumbnailOutcome::Fresh { ref bytes, tier } = first else {
            panic!("expected fresh outcome, got {first:?}");
        };
        assert_eq!(tier, UpstreamTier::Primary);
        let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (SIZE, SIZE));

        let path = service
            .cache()
            .cache_path(&ThumbnailId::parse("fresh1").unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), bytes.to_vec());

        // second request is served from disk; the mock allows one fetch only
        let second = service.get_thumbnail("fresh1").await.unwrap();
        assert_eq!(second.label(), "cached");
        assert_eq!(second.bytes(), first.bytes());
    }

    #[tokio::test]
    async fn test_fallback_tier_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(fetched(jpeg_bytes(32, 24), UpstreamTier::Fallback)));
        let service = service_with(source, dir.path());

        let outcome = service.get_thumbnail("deadbeef").await.unwrap();
        assert!(matches!(
            outcome,
            ThumbnailOutcome::Fresh {
                tier: UpstreamTier::Fallback,
                ..
            }
        ));
        assert_eq!(cache_entries(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_serves_uncached_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source.expect_fetch().times(1).returning(|_| Err(all_failed()));
        let service = service_with(source, dir.path());

        let outcome = service.get_thumbnail("ghost").await.unwrap();

        assert_eq!(
            outcome,
            ThumbnailOutcome::Placeholder {
                bytes: service.placeholder(),
                reason: PlaceholderReason::UpstreamUnavailable,
            }
        );
        assert!(!outcome.is_cacheable());
        assert_eq!(cache_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_undecodable_body_serves_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .times(2)
            .returning(|_| Ok(fetched(Bytes::from_static(b"<html>"), UpstreamTier::Primary)));
        let service = service_with(source, dir.path());

        let outcome = service.get_thumbnail("garbled").await.unwrap();
        assert!(matches!(
            outcome,
            ThumbnailOutcome::Placeholder {
                reason: PlaceholderReason::Undecodable,
                ..
            }
        ));
        assert_eq!(cache_entries(dir.path()), 0);

        // nothing cached, so the next request tries upstream again
        let again = service.get_thumbnail("garbled").await.unwrap();
        assert_eq!(again.label(), "placeholder");
    }

    #[tokio::test]
    async fn test_empty_body_serves_placeholder() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(fetched(Bytes::new(), UpstreamTier::Primary)));
        let service = service_with(source, dir.path());

        let outcome = service.get_thumbnail("empty").await.unwrap();
        assert!(matches!(
            outcome,
            ThumbnailOutcome::Placeholder {
                reason: PlaceholderReason::Undecodable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stale_entry_is_refetched_and_replaced() {
        let dir = TempDir::new().unwrap();
        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(fetched(jpeg_bytes(20, 20), UpstreamTier::Primary)));
        let service = service_with(source, dir.path());

        let path = service
            .cache()
            .cache_path(&ThumbnailId::parse("stale").unwrap());
        std::fs::write(&path, b"old bytes").unwrap();
        let old = SystemTime::now() - TTL - Duration::from_secs(10);
        filetime::set_file_mtime(&path, FileTime::from_system_time(old)).unwrap();

        let outcome = service.get_thumbnail("stale").await.unwrap();

        assert_eq!(outcome.label(), "fresh");
        let on_disk = std::fs::read(&path).unwrap();
        assert_ne!(on_disk, b"old bytes");
        assert_eq!(on_disk, outcome.bytes().to_vec());
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_serves_fresh_bytes() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let mut source = MockThumbnailSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(fetched(jpeg_bytes(24, 24), UpstreamTier::Primary)));
        let service = service_with(source, &blocker.join("cache"));

        let outcome = service.get_thumbnail("unwritable").await.unwrap();
        assert_eq!(outcome.label(), "fresh");
        assert!(!outcome.bytes().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_matches_blank_render() {
        let dir = TempDir::new().unwrap();
        let service = service_with(MockThumbnailSource::new(), dir.path());

        let expected = ImageNormalizer::new(SIZE).blank().unwrap();
        assert_eq!(service.placeholder(), Bytes::from(expected));
        assert_eq!(service.size(), SIZE);
    }
}
