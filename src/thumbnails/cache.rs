//! On-disk thumbnail cache
//!
//! Entries live flat in one directory as `{sha256(id)}_{size}.png`. Expiry is
//! purely logical: an entry is fresh while its modification time is younger
//! than the TTL, and stale entries are overwritten on the next miss. Nothing
//! here ever deletes a file.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::identifier::ThumbnailId;
use crate::config::Config;
use crate::errors::CacheWriteError;

#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    size: u32,
    ttl: Duration,
}

impl ThumbnailCache {
    pub fn new(cache_dir: PathBuf, size: u32, ttl: Duration) -> Self {
        Self {
            cache_dir,
            size,
            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.storage.cache_dir.clone(),
            config.thumbnail.size,
            config.thumbnail.cache_ttl,
        )
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub async fn ensure_cache_dir(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.cache_dir).await
    }

    /// File stem for an identifier at the configured size
    pub fn cache_key(&self, id: &ThumbnailId) -> String {
        let digest = Sha256::digest(id.as_str().as_bytes());
        format!("{}_{}", hex::encode(digest), self.size)
    }

    pub fn cache_path(&self, id: &ThumbnailId) -> PathBuf {
        self.cache_dir.join(format!("{}.png", self.cache_key(id)))
    }

    pub async fn is_fresh(&self, path: &Path) -> bool {
        self.is_fresh_at(path, SystemTime::now()).await
    }

    /// Fresh iff the file exists and `now - mtime < ttl`.
    ///
    /// A modification time ahead of `now` counts as age zero.
    pub async fn is_fresh_at(&self, path: &Path, now: SystemTime) -> bool {
        let Ok(metadata) = fs::metadata(path).await else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        let Ok(modified) = metadata.modified() else {
            return false;
        };

        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        trace!("Cache entry {} is {:?} old", path.display(), age);
        age < self.ttl
    }

    pub async fn read(&self, path: &Path) -> Result<Vec<u8>, std::io::Error> {
        fs::read(path).await
    }

    /// Persist normalized bytes, never failing the caller.
    ///
    /// Returns whether the entry landed on disk; failures are logged here.
    pub async fn store(&self, path: &Path, bytes: &[u8]) -> bool {
        match self.try_store(path, bytes).await {
            Ok(()) => {
                debug!("Cached thumbnail at {} ({} bytes)", path.display(), bytes.len());
                true
            }
            Err(e) => {
                warn!("Thumbnail not cached: {}", e);
                false
            }
        }
    }

    /// Write to a sibling temp file then rename over the target
    async fn try_store(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheWriteError> {
        let dir = path.parent().unwrap_or(self.cache_dir.as_path());
        fs::create_dir_all(dir)
            .await
            .map_err(|source| CacheWriteError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = dir.join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        if let Err(source) = fs::write(&temp_path, bytes).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheWriteError::Write {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheWriteError::Rename {
                path: path.to_path_buf(),
                source,
            });
        }

        Ok(())
    }
}
