//! Settings from the process environment.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use ocm_core::{OfflineSupportConfig, SyncSettings};

/// Load `.env` if present, then read settings from the environment.
pub fn settings_from_env() -> Result<SyncSettings> {
    dotenvy::dotenv().ok();
    settings_from_lookup(|key| std::env::var(key).ok())
}

/// Build settings from `lookup`, which maps variable names to values.
///
/// Unset variables keep their defaults; `OCM_API_BASE_URL` is required.
pub fn settings_from_lookup<F>(lookup: F) -> Result<SyncSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(base_url) = lookup("OCM_API_BASE_URL").filter(|url| !url.trim().is_empty()) else {
        bail!("OCM_API_BASE_URL is not set");
    };
    let mut settings = SyncSettings::new(base_url);

    settings.api_token = lookup("OCM_API_TOKEN").filter(|token| !token.is_empty());

    if let Some(mode) = lookup("OCM_OFFLINE_SUPPORT") {
        settings.offline_support = parse_offline_support(&mode)?;
    }
    if let Some(limit) = lookup("OCM_DOWNLOAD_LIMIT") {
        settings.download_limit = limit
            .trim()
            .parse()
            .with_context(|| format!("Invalid OCM_DOWNLOAD_LIMIT: {limit}"))?;
    }
    if let Some(path) = lookup("OCM_DATABASE_PATH").filter(|path| !path.is_empty()) {
        settings.database_path = Some(PathBuf::from(path));
    }
    if let Some(dir) = lookup("OCM_IMAGE_CACHE_DIR").filter(|dir| !dir.is_empty()) {
        settings.image_cache_dir = PathBuf::from(dir);
    }

    Ok(settings)
}

fn parse_offline_support(mode: &str) -> Result<Option<OfflineSupportConfig>> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "" | "off" | "false" | "0" => Ok(None),
        "on" | "true" | "1" => Ok(Some(OfflineSupportConfig {
            cache_images: false,
        })),
        "images" => Ok(Some(OfflineSupportConfig { cache_images: true })),
        other => bail!("Invalid OCM_OFFLINE_SUPPORT: {other} (expected off, on or images)"),
    }
}
