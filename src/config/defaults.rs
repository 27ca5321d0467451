/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SERVICE_NAME: &str = "tubepresence-thumb-proxy";

// Storage defaults
pub const DEFAULT_CACHE_DIR: &str = "thumb_cache";

// Thumbnail defaults
pub const DEFAULT_THUMB_SIZE: u32 = 1024;
pub const MAX_THUMB_SIZE: u32 = 8192;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60 * 24;
pub const DEFAULT_CLIENT_MAX_AGE_SECS: u64 = 60 * 60;

// Upstream defaults
pub const DEFAULT_PRIMARY_URL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/maxresdefault.jpg";
pub const DEFAULT_FALLBACK_URL_TEMPLATE: &str = "https://i.ytimg.com/vi/{id}/hqdefault.jpg";
pub const DEFAULT_USER_AGENT: &str = "TubePresenceThumbProxy/1.0 (+https://example.com)";
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Placeholder substituted with the percent-encoded identifier in URL templates
pub const ID_PLACEHOLDER: &str = "{id}";
