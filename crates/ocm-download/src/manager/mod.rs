//! Image download scheduler.
//!
//! Wraps the pure [`ImageQueue`] with a lock and executes the effects it
//! returns: transfers are spawned as tasks on the transport, completions are
//! delivered through oneshot channels.
//!
//! # Concurrency Model
//!
//! - All queue decisions happen under one `Mutex`, so enqueue and dequeue
//!   are atomic with respect to concurrent callers
//! - Effects are applied before that lock is released, so the transport
//!   sees starts, pauses and cancels in the order the queue decided them
//! - A transfer is registered with the transport before its task is
//!   spawned; a pause or cancel right after the start always applies
//! - Lease tokens prevent stale transfer results from being committed

mod ticket;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};

use ocm_core::{DownloadTransport, ImageCacheError, ImagePriority, TransportError};

use crate::queue::{ImageQueue, LeaseId, SchedulerEffect, SchedulerSnapshot};

pub use ticket::ImageTicket;

type Completion = oneshot::Sender<Result<PathBuf, ImageCacheError>>;

/// Configuration for the download scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum simultaneous transfers.
    pub download_limit: usize,
    /// Consecutive idle sweeps before an unreferenced image is evicted.
    pub eviction_idle_sweeps: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            download_limit: ocm_core::DEFAULT_DOWNLOAD_LIMIT,
            eviction_idle_sweeps: 2,
        }
    }
}

/// Bounded-concurrency, two-priority image download manager.
pub struct DownloadScheduler {
    queue: Mutex<ImageQueue<Completion>>,
    transport: Arc<dyn DownloadTransport>,
    config: SchedulerConfig,
}

impl DownloadScheduler {
    pub fn new(transport: Arc<dyn DownloadTransport>, config: SchedulerConfig) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(ImageQueue::new(config.download_limit)),
            transport,
            config,
        })
    }

    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Local file of the image at `path`, downloading it if needed.
    ///
    /// `content` is the identifier of the content item displaying the image;
    /// images referenced by no live content become eligible for eviction.
    pub async fn cached_image(
        self: &Arc<Self>,
        path: &str,
        content: &str,
        priority: ImagePriority,
    ) -> Result<PathBuf, ImageCacheError> {
        self.request_image(path, content, priority).await.wait().await
    }

    /// Register interest in the image at `path` without waiting for it.
    ///
    /// The returned ticket resolves once the image is available or failed.
    /// Dropping the ticket does not cancel the download.
    pub async fn request_image(
        self: &Arc<Self>,
        path: &str,
        content: &str,
        priority: ImagePriority,
    ) -> ImageTicket {
        if path.trim().is_empty() {
            return ImageTicket::ready(Err(ImageCacheError::InvalidUrl));
        }

        let cached = self.queue.lock().await.cached_location(path, content);
        if let Some(location) = cached {
            if is_loadable(&location).await {
                tracing::debug!(target: "ocm.download", path, "Image served from cache");
                return ImageTicket::ready(Ok(location));
            }
            tracing::warn!(
                target: "ocm.download",
                path,
                location = %location.display(),
                "Cached image is no longer readable, downloading again"
            );
            self.queue.lock().await.discard(path);
        }

        let (tx, rx) = oneshot::channel();
        let mut queue = self.queue.lock().await;
        let effects = queue.request(path, content, priority, tx);
        tracing::debug!(target: "ocm.download", path, priority = ?priority, "Image requested");
        self.apply(effects);
        ImageTicket::pending(rx)
    }

    /// Pause low-priority downloads. High-priority downloads continue.
    pub async fn pause_caching(self: &Arc<Self>) {
        let mut queue = self.queue.lock().await;
        let effects = queue.pause();
        tracing::info!(target: "ocm.download", paused = effects.len(), "Image caching paused");
        self.apply(effects);
    }

    pub async fn resume_caching(self: &Arc<Self>) {
        let mut queue = self.queue.lock().await;
        let effects = queue.resume();
        tracing::info!(target: "ocm.download", "Image caching resumed");
        self.apply(effects);
    }

    /// Cancel every queued and running download.
    ///
    /// Their waiters receive [`ImageCacheError::CachingCancelled`].
    pub async fn cancel_caching(self: &Arc<Self>) {
        let mut queue = self.queue.lock().await;
        let effects = queue.cancel();
        tracing::info!(
            target: "ocm.download",
            cancelled = effects.len().saturating_sub(1),
            "Image caching cancelled"
        );
        self.apply(effects);
    }

    /// Cancel everything and delete every cached file.
    pub async fn purge(self: &Arc<Self>) {
        let files = {
            let mut queue = self.queue.lock().await;
            let effects = queue.cancel();
            self.apply(effects);
            queue.purge_cached()
        };
        remove_files(files).await;
    }

    /// Run one eviction sweep, dropping associations to `retired_content`.
    ///
    /// Returns the number of evicted images.
    pub async fn sweep(&self, retired_content: &HashSet<String>) -> usize {
        let evicted = self
            .queue
            .lock()
            .await
            .sweep(retired_content, self.config.eviction_idle_sweeps);
        let count = evicted.len();
        if count > 0 {
            tracing::info!(target: "ocm.download", evicted = count, "Evicted unreferenced images");
        }
        remove_files(evicted).await;
        count
    }

    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.queue.lock().await.snapshot()
    }

    /// Execute `effects` in order. Callers hold the queue lock.
    fn apply(self: &Arc<Self>, effects: Vec<SchedulerEffect<Completion>>) {
        for effect in effects {
            match effect {
                SchedulerEffect::Start { path, lease } => self.spawn_transfer(path, lease),
                SchedulerEffect::Pause { path } => self.transport.pause_download(&path),
                SchedulerEffect::Cancel { path } => {
                    tracing::debug!(target: "ocm.download", path = %path, "Preempting transfer");
                    self.transport.cancel_download(&path);
                }
                SchedulerEffect::ResumeAll => self.transport.resume_downloads(),
                SchedulerEffect::CancelAll => self.transport.cancel_downloads(),
                SchedulerEffect::Complete {
                    path,
                    completions,
                    outcome,
                } => {
                    match &outcome {
                        Ok(location) => tracing::info!(
                            target: "ocm.download",
                            path = %path,
                            location = %location.display(),
                            waiters = completions.len(),
                            "Image cached"
                        ),
                        Err(error) => tracing::warn!(
                            target: "ocm.download",
                            path = %path,
                            error = %error,
                            waiters = completions.len(),
                            "Image caching failed"
                        ),
                    }
                    for completion in completions {
                        // A waiter that dropped its ticket is not interested anymore.
                        let _ = completion.send(outcome.clone());
                    }
                }
            }
        }
    }

    fn spawn_transfer(self: &Arc<Self>, path: String, lease: LeaseId) {
        tracing::debug!(target: "ocm.download", path = %path, "Starting transfer");
        let transfer = self.transport.begin_download(&path);
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let result = scheduler.transport.download(&path, transfer).await;
            let outcome = scheduler.translate(result).await;
            let mut queue = scheduler.queue.lock().await;
            let effects = queue.finish(&path, lease, outcome);
            scheduler.apply(effects);
        });
    }

    async fn translate(
        &self,
        result: Result<PathBuf, TransportError>,
    ) -> Result<PathBuf, ImageCacheError> {
        match result {
            Ok(location) if is_loadable(&location).await => Ok(location),
            Ok(_) => Err(ImageCacheError::CachingFailed),
            Err(error) => Err(error.into()),
        }
    }
}

/// An image is loadable when its file exists and is not empty.
async fn is_loadable(location: &Path) -> bool {
    tokio::fs::metadata(location)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

async fn remove_files(files: Vec<PathBuf>) {
    for file in files {
        if let Err(e) = tokio::fs::remove_file(&file).await {
            tracing::warn!(
                target: "ocm.download",
                file = %file.display(),
                error = %e,
                "Failed to delete cached image"
            );
        }
    }
}
