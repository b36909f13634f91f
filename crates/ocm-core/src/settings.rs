//! Settings domain types and validation.
//!
//! Pure data with no infrastructure dependencies. Loading from the
//! environment happens in `ocm-bootstrap`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Maximum number of simultaneous image transfers.
pub const DEFAULT_DOWNLOAD_LIMIT: usize = 3;

/// Attempts a transport makes before reporting `RetryLimitExceeded`.
pub const DEFAULT_MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// Page size used when a caller does not specify one.
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 12;

const DEFAULT_EVICTION_IDLE_SWEEPS: u32 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Offline-support options. Presence of this struct enables offline support.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OfflineSupportConfig {
    /// Prefetch content images for offline display.
    pub cache_images: bool,
}

/// Configuration of the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// `None` disables offline support: every read prefers the network and
    /// the local store is not authoritative.
    pub offline_support: Option<OfflineSupportConfig>,

    /// Simultaneous image transfers (1-16).
    pub download_limit: usize,

    /// Transport retry budget per image (1-10).
    pub max_download_attempts: u32,

    /// Consecutive sweeps an unreferenced image survives before eviction.
    pub eviction_idle_sweeps: u32,

    pub default_items_per_page: u32,

    /// Base URL of the content API.
    pub api_base_url: String,

    pub api_token: Option<String>,

    pub request_timeout_secs: u64,

    /// `None` keeps the store in memory.
    pub database_path: Option<PathBuf>,

    /// Directory image files are written to.
    pub image_cache_dir: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            offline_support: None,
            download_limit: DEFAULT_DOWNLOAD_LIMIT,
            max_download_attempts: DEFAULT_MAX_DOWNLOAD_ATTEMPTS,
            eviction_idle_sweeps: DEFAULT_EVICTION_IDLE_SWEEPS,
            default_items_per_page: DEFAULT_ITEMS_PER_PAGE,
            api_base_url: String::new(),
            api_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            database_path: None,
            image_cache_dir: std::env::temp_dir().join("ocm-images"),
        }
    }
}

impl SyncSettings {
    /// Settings for `api_base_url` with every other field defaulted.
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_offline_support(mut self, config: OfflineSupportConfig) -> Self {
        self.offline_support = Some(config);
        self
    }

    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_image_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_cache_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn with_download_limit(mut self, limit: usize) -> Self {
        self.download_limit = limit;
        self
    }

    pub const fn offline_support_enabled(&self) -> bool {
        self.offline_support.is_some()
    }

    /// Whether content images should be prefetched.
    pub fn image_caching_enabled(&self) -> bool {
        self.offline_support
            .as_ref()
            .is_some_and(|offline| offline.cache_images)
    }
}

/// Errors that can occur during settings validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Download limit must be between 1 and 16, got {0}")]
    InvalidDownloadLimit(usize),

    #[error("Download attempts must be between 1 and 10, got {0}")]
    InvalidAttempts(u32),

    #[error("Items per page must be at least 1")]
    InvalidItemsPerPage,

    #[error("Eviction idle sweeps must be at least 1")]
    InvalidEvictionSweeps,

    #[error("API base URL cannot be empty")]
    EmptyBaseUrl,
}

/// Validate settings values.
pub fn validate_settings(settings: &SyncSettings) -> Result<(), SettingsError> {
    if !(1..=16).contains(&settings.download_limit) {
        return Err(SettingsError::InvalidDownloadLimit(settings.download_limit));
    }

    if !(1..=10).contains(&settings.max_download_attempts) {
        return Err(SettingsError::InvalidAttempts(settings.max_download_attempts));
    }

    if settings.default_items_per_page == 0 {
        return Err(SettingsError::InvalidItemsPerPage);
    }

    if settings.eviction_idle_sweeps == 0 {
        return Err(SettingsError::InvalidEvictionSweeps);
    }

    if settings.api_base_url.trim().is_empty() {
        return Err(SettingsError::EmptyBaseUrl);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SyncSettings::new("https://api.example.com");
        assert_eq!(settings.download_limit, 3);
        assert_eq!(settings.max_download_attempts, 3);
        assert!(!settings.offline_support_enabled());
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_image_caching_requires_offline_support() {
        let settings = SyncSettings::new("https://api.example.com");
        assert!(!settings.image_caching_enabled());

        let settings = settings.with_offline_support(OfflineSupportConfig { cache_images: true });
        assert!(settings.offline_support_enabled());
        assert!(settings.image_caching_enabled());
    }

    #[test]
    fn test_validate_download_limit() {
        let settings = SyncSettings::new("https://api.example.com").with_download_limit(0);
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::InvalidDownloadLimit(0))
        );
    }

    #[test]
    fn test_validate_empty_base_url() {
        let settings = SyncSettings::new("   ");
        assert_eq!(validate_settings(&settings), Err(SettingsError::EmptyBaseUrl));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: SyncSettings = serde_json::from_str(
            r#"{ "api_base_url": "https://api.example.com", "offline_support": { "cache_images": true } }"#,
        )
        .unwrap();
        assert_eq!(settings.download_limit, DEFAULT_DOWNLOAD_LIMIT);
        assert!(settings.image_caching_enabled());
    }
}
