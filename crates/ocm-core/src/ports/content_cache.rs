//! Image layer port used by the sync coordinator.
//!
//! The coordinator never talks to the download scheduler directly. It tells
//! this layer which sections and contents exist and when caching their
//! images may start.

use async_trait::async_trait;

use crate::domain::Content;
use crate::errors::ContentError;

/// Tracks content images per section and feeds them to the download scheduler.
#[async_trait]
pub trait ContentCachePort: Send + Sync {
    async fn initialize_cache(&self);

    /// Cancel outstanding image work and forget every tracked section.
    async fn reset_cache(&self);

    /// Register the content paths of the sections worth prefetching.
    async fn cache_sections(&self, paths: Vec<String>);

    /// Record the contents of the section under `path`, replacing earlier ones.
    ///
    /// Fails with [`ContentError::CacheNotInitialized`] before
    /// [`initialize_cache`](Self::initialize_cache).
    async fn cache_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError>;

    /// Add the contents of a later page to the section under `path`.
    ///
    /// Their images stay live for as long as the section does. When the
    /// section was already started the new images are queued right away.
    async fn append_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError>;

    /// Start downloading the images of the section under `path`.
    async fn start_caching_section(&self, path: &str);

    /// Start downloading the images of every section not started yet.
    async fn start_caching(&self);
}

/// A no-op image layer for hosts without offline image support.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopContentCache;

#[async_trait]
impl ContentCachePort for NoopContentCache {
    async fn initialize_cache(&self) {}

    async fn reset_cache(&self) {}

    async fn cache_sections(&self, _paths: Vec<String>) {}

    async fn cache_contents(&self, _path: &str, _contents: &[Content]) -> Result<(), ContentError> {
        Ok(())
    }

    async fn append_contents(&self, _path: &str, _contents: &[Content]) -> Result<(), ContentError> {
        Ok(())
    }

    async fn start_caching_section(&self, _path: &str) {}

    async fn start_caching(&self) {}
}
