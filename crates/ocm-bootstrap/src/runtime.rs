//! Composition root.
//!
//! The only place where the adapters are instantiated and wired together:
//! - SQLite content store (via ocm-db)
//! - Content API client and image transport (via ocm-http)
//! - Download scheduler and image layer (via ocm-download)
//! - Sync coordinator (via ocm-sync)

use std::sync::Arc;

use anyhow::{Context, Result};
use ocm_core::{
    ContentCachePort, ContentStore, NoopContentCache, StaticReachability, SyncSettings,
    validate_settings,
};
use ocm_db::{SqliteContentStore, setup_database, setup_memory_database};
use ocm_download::{ContentCacheManager, DownloadScheduler, SchedulerConfig};
use ocm_http::{DefaultContentApiClient, HttpClientConfig, HttpDownloadTransport};
use ocm_sync::{CoordinatorConfig, SyncCoordinator, SyncCoordinatorDeps, build_sync_coordinator};

/// Fully composed sync engine.
pub struct OcmRuntime {
    /// Entry point for menus, content lists and actions.
    pub coordinator: Arc<SyncCoordinator>,
    /// Image downloads requested by the host for display.
    pub scheduler: Arc<DownloadScheduler>,
    /// Image layer the coordinator feeds.
    pub content_cache: Arc<dyn ContentCachePort>,
    /// Connectivity flag; hosts forward platform reachability changes here.
    pub reachability: Arc<StaticReachability>,
}

/// Build the engine described by `settings`.
///
/// Steps:
/// 1. Validate the settings
/// 2. Open the content store (file-backed, or in memory without a path)
/// 3. Create the API client and the image transport
/// 4. Create the download scheduler and the image layer
/// 5. Assemble the coordinator
pub async fn build_runtime(settings: &SyncSettings) -> Result<OcmRuntime> {
    validate_settings(settings).context("Invalid sync settings")?;

    // 1. Content store
    let pool = match &settings.database_path {
        Some(path) => setup_database(path).await?,
        None => setup_memory_database().await?,
    };
    let store: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::new(pool));

    // 2. HTTP adapters share one configuration
    let http_config = HttpClientConfig::from_settings(settings);
    let remote = Arc::new(
        DefaultContentApiClient::new(&http_config).context("Failed to create content API client")?,
    );
    let transport = Arc::new(
        HttpDownloadTransport::new(&http_config, settings.image_cache_dir.clone())
            .with_context(|| {
                format!(
                    "Failed to prepare image cache directory: {}",
                    settings.image_cache_dir.display()
                )
            })?,
    );

    // 3. Images
    let scheduler = DownloadScheduler::new(
        transport,
        SchedulerConfig {
            download_limit: settings.download_limit,
            eviction_idle_sweeps: settings.eviction_idle_sweeps,
        },
    );
    let content_cache: Arc<dyn ContentCachePort> = if settings.image_caching_enabled() {
        let manager = Arc::new(ContentCacheManager::new(Arc::clone(&scheduler)));
        manager.initialize_cache().await;
        manager
    } else {
        Arc::new(NoopContentCache)
    };

    // 4. Coordinator
    let reachability = Arc::new(StaticReachability::default());
    let coordinator = build_sync_coordinator(SyncCoordinatorDeps {
        store,
        remote,
        reachability: Arc::clone(&reachability) as _,
        content_cache: Arc::clone(&content_cache),
        config: CoordinatorConfig::from(settings),
    });

    tracing::info!(
        target: "ocm.sync",
        base_url = %settings.api_base_url,
        offline_support = settings.offline_support_enabled(),
        image_caching = settings.image_caching_enabled(),
        "Sync engine ready"
    );

    Ok(OcmRuntime {
        coordinator,
        scheduler,
        content_cache,
        reachability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[tokio::test]
    async fn test_invalid_settings_are_rejected() {
        let settings = SyncSettings::new("");
        assert!(build_runtime(&settings).await.is_err());
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("content.db");
        let settings = SyncSettings::new("http://localhost:9")
            .with_database_path(&db_path)
            .with_image_cache_dir(dir.path().join("images"));

        let runtime = build_runtime(&settings).await.unwrap();
        assert!(db_path.exists());
        assert!(dir.path().join("images").is_dir());
        assert_eq!(runtime.scheduler.config().download_limit, 3);
    }
}
