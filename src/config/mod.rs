use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
    value::{Uncased, UncasedStr},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use crate::errors::{AppError, AppResult};
use defaults::*;

/// Environment variables read without a prefix, kept for deployments that
/// predate the `THUMB_PROXY_` namespace.
const LEGACY_ENV_KEYS: &[&str] = &["CACHE_DIR", "THUMB_SIZE", "CACHE_TTL", "PORT"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub thumbnail: ThumbnailConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Name reported by the index endpoint
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Side length in pixels of every normalized thumbnail
    pub size: u32,
    /// How long a cached thumbnail is served without refetching
    #[serde(with = "duration_serde::duration")]
    pub cache_ttl: Duration,
    /// max-age advertised to clients on real thumbnails
    #[serde(with = "duration_serde::duration")]
    pub client_max_age: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// High resolution source, tried first
    pub primary_url_template: String,
    /// Lower resolution source that nearly always exists
    pub fallback_url_template: String,
    pub user_agent: String,
    #[serde(with = "duration_serde::duration")]
    pub timeout: Duration,
    pub max_image_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_THUMB_SIZE,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            client_max_age: Duration::from_secs(DEFAULT_CLIENT_MAX_AGE_SECS),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            primary_url_template: DEFAULT_PRIMARY_URL_TEMPLATE.to_string(),
            fallback_url_template: DEFAULT_FALLBACK_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            storage: StorageConfig::default(),
            thumbnail: ThumbnailConfig::default(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// Map a legacy flat environment variable onto its nested config key
fn legacy_env_key(key: &UncasedStr) -> Uncased<'_> {
    match key.as_str().to_ascii_uppercase().as_str() {
        "CACHE_DIR" => "storage.cache_dir".into(),
        "THUMB_SIZE" => "thumbnail.size".into(),
        "CACHE_TTL" => "thumbnail.cache_ttl".into(),
        "PORT" => "web.port".into(),
        _ => key.as_str().into(),
    }
}

impl Config {
    /// Load configuration using `CONFIG_FILE` (if set) as the optional TOML file
    pub fn load() -> Result<Self> {
        let config_file = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
        Self::load_from(config_file.as_deref())
    }

    /// Load configuration layered as defaults, TOML file, prefixed env, legacy env
    pub fn load_from(config_file: Option<&Path>) -> Result<Self> {
        let config: Config = Self::figment(config_file)
            .extract()
            .context("Failed to read configuration")?;
        config.validate()?;

        if let Some(path) = config_file {
            if path.exists() {
                info!("Configuration loaded from: {}", path.display());
            } else {
                info!(
                    "Config file {} not found, using defaults and environment",
                    path.display()
                );
            }
        }

        Ok(config)
    }

    /// Provider chain used by [`Config::load_from`]
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            figment = figment.merge(Toml::file(path));
        }

        figment
            .merge(Env::prefixed("THUMB_PROXY_").split("__"))
            .merge(Env::raw().only(LEGACY_ENV_KEYS).map(legacy_env_key))
    }

    /// Reject values the thumbnail pipeline cannot work with
    pub fn validate(&self) -> AppResult<()> {
        if self.thumbnail.size == 0 || self.thumbnail.size > MAX_THUMB_SIZE {
            return Err(AppError::configuration(format!(
                "thumbnail.size must be between 1 and {MAX_THUMB_SIZE}, got {}",
                self.thumbnail.size
            )));
        }
        if self.thumbnail.cache_ttl.is_zero() {
            return Err(AppError::configuration("thumbnail.cache_ttl must be positive"));
        }
        if self.upstream.timeout.is_zero() {
            return Err(AppError::configuration("upstream.timeout must be positive"));
        }
        if self.upstream.user_agent.trim().is_empty() {
            return Err(AppError::configuration("upstream.user_agent must not be empty"));
        }
        for (name, template) in [
            ("upstream.primary_url_template", &self.upstream.primary_url_template),
            ("upstream.fallback_url_template", &self.upstream.fallback_url_template),
        ] {
            if !template.contains(ID_PLACEHOLDER) {
                return Err(AppError::configuration(format!(
                    "{name} must contain the {ID_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(())
    }

    /// `Cache-Control` value sent with real (non-placeholder) thumbnails
    pub fn cache_control_header(&self) -> String {
        format!("public, max-age={}", self.thumbnail.client_max_age.as_secs())
    }
}
