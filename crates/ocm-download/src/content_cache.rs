//! Content-aware image layer.
//!
//! Remembers which images belong to which section and feeds them to the
//! [`DownloadScheduler`] at low priority once the coordinator says caching
//! may start. Also drives the eviction sweep whenever the contents of a
//! section are replaced.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use ocm_core::{Content, ContentCachePort, ContentError, ImagePriority};

use crate::manager::DownloadScheduler;

#[derive(Debug, Default)]
struct SectionImages {
    /// `(image path, content id)` pairs in display order.
    images: Vec<(String, String)>,
    started: bool,
}

#[derive(Debug, Default)]
struct CacheBook {
    initialized: bool,
    sections: IndexMap<String, SectionImages>,
}

impl CacheBook {
    fn live_content(&self) -> HashSet<String> {
        self.sections
            .values()
            .flat_map(|section| section.images.iter().map(|(_, content)| content.clone()))
            .collect()
    }

    /// Replace the images of the section under `path` and return the content
    /// identifiers no section references anymore.
    fn replace(&mut self, path: &str, images: Vec<(String, String)>) -> HashSet<String> {
        let before = self.live_content();
        let section = self.sections.entry(path.to_string()).or_default();
        section.images = images;
        section.started = false;
        let after = self.live_content();
        before.difference(&after).cloned().collect()
    }

    /// Add images to the section under `path` and return those to queue now
    /// because the section already started.
    fn append(&mut self, path: &str, images: Vec<(String, String)>) -> Vec<(String, String)> {
        let section = self.sections.entry(path.to_string()).or_default();
        let fresh: Vec<(String, String)> = images
            .into_iter()
            .filter(|pair| !section.images.contains(pair))
            .collect();
        section.images.extend(fresh.iter().cloned());
        if section.started { fresh } else { Vec::new() }
    }

    /// Mark the section under `path` as started and return its images, or
    /// `None` if it has no images or was already started.
    fn take_for_start(&mut self, path: &str) -> Option<Vec<(String, String)>> {
        let section = self.sections.get_mut(path)?;
        if section.started || section.images.is_empty() {
            return None;
        }
        section.started = true;
        Some(section.images.clone())
    }
}

/// Implementation of [`ContentCachePort`] on top of a [`DownloadScheduler`].
pub struct ContentCacheManager {
    scheduler: Arc<DownloadScheduler>,
    book: Mutex<CacheBook>,
}

impl ContentCacheManager {
    pub fn new(scheduler: Arc<DownloadScheduler>) -> Self {
        Self {
            scheduler,
            book: Mutex::new(CacheBook::default()),
        }
    }

    pub fn scheduler(&self) -> &Arc<DownloadScheduler> {
        &self.scheduler
    }

    async fn submit(&self, path: &str, images: Vec<(String, String)>) {
        if images.is_empty() {
            return;
        }
        tracing::debug!(
            target: "ocm.download",
            section = path,
            images = images.len(),
            "Caching section images"
        );
        let mut tickets = Vec::with_capacity(images.len());
        for (image, content) in images {
            tickets.push((
                image.clone(),
                self.scheduler
                    .request_image(&image, &content, ImagePriority::Low)
                    .await,
            ));
        }

        tokio::spawn(async move {
            for (image, ticket) in tickets {
                if let Err(e) = ticket.wait().await {
                    if !e.is_cancelled() {
                        tracing::debug!(target: "ocm.download", image = %image, error = %e, "Prefetch failed");
                    }
                }
            }
        });
    }
}

#[async_trait]
impl ContentCachePort for ContentCacheManager {
    async fn initialize_cache(&self) {
        self.book.lock().await.initialized = true;
        tracing::info!(target: "ocm.download", "Image cache initialized");
    }

    async fn reset_cache(&self) {
        {
            let mut book = self.book.lock().await;
            book.sections.clear();
        }
        self.scheduler.purge().await;
        tracing::info!(target: "ocm.download", "Image cache reset");
    }

    async fn cache_sections(&self, paths: Vec<String>) {
        let mut book = self.book.lock().await;
        for path in paths {
            book.sections.entry(path).or_default();
        }
    }

    async fn cache_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError> {
        let retired = {
            let mut book = self.book.lock().await;
            if !book.initialized {
                return Err(ContentError::CacheNotInitialized);
            }
            book.replace(path, content_images(contents))
        };

        self.scheduler.sweep(&retired).await;
        Ok(())
    }

    async fn append_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError> {
        let queued = {
            let mut book = self.book.lock().await;
            if !book.initialized {
                return Err(ContentError::CacheNotInitialized);
            }
            book.append(path, content_images(contents))
        };

        self.submit(path, queued).await;
        Ok(())
    }

    async fn start_caching_section(&self, path: &str) {
        let images = {
            let mut book = self.book.lock().await;
            if !book.initialized {
                return;
            }
            book.take_for_start(path)
        };
        if let Some(images) = images {
            self.submit(path, images).await;
        }
    }

    async fn start_caching(&self) {
        let batches: Vec<(String, Vec<(String, String)>)> = {
            let mut book = self.book.lock().await;
            if !book.initialized {
                return;
            }
            let paths: Vec<String> = book.sections.keys().cloned().collect();
            paths
                .into_iter()
                .filter_map(|path| book.take_for_start(&path).map(|images| (path, images)))
                .collect()
        };

        for (path, images) in batches {
            self.submit(&path, images).await;
        }
    }
}

/// `(image path, content id)` pairs of the contents that have an image.
fn content_images(contents: &[Content]) -> Vec<(String, String)> {
    contents
        .iter()
        .filter_map(|content| {
            content
                .media
                .image_url
                .clone()
                .map(|image| (image, content.id.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{BTreeSet, HashMap};
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use ocm_core::{DownloadTransport, Media, TransferId, TransportError};
    use tempfile::TempDir;

    use crate::manager::SchedulerConfig;

    /// Transport that writes a file for every transfer immediately.
    struct InstantTransport {
        dir: TempDir,
        downloads: StdMutex<HashMap<String, usize>>,
    }

    #[async_trait]
    impl DownloadTransport for InstantTransport {
        fn begin_download(&self, _path: &str) -> TransferId {
            TransferId(0)
        }

        async fn download(&self, path: &str, _transfer: TransferId) -> Result<PathBuf, TransportError> {
            *self
                .downloads
                .lock()
                .unwrap()
                .entry(path.to_string())
                .or_default() += 1;
            let file = self.dir.path().join(path.replace('/', "_"));
            std::fs::write(&file, b"img").unwrap();
            Ok(file)
        }

        fn pause_download(&self, _path: &str) {}
        fn cancel_download(&self, _path: &str) {}
        fn resume_downloads(&self) {}
        fn cancel_downloads(&self) {}
    }

    fn content(id: &str, image: Option<&str>) -> Content {
        Content {
            id: id.to_string(),
            slug: id.to_string(),
            element_url: format!("/element/{id}"),
            name: None,
            media: Media {
                image_url: image.map(str::to_string),
                ..Media::default()
            },
            tags: BTreeSet::new(),
            required_auth_level: None,
            custom_properties: None,
            schedule_windows: vec![],
            action_reference: None,
        }
    }

    fn setup() -> (ContentCacheManager, Arc<InstantTransport>) {
        let transport = Arc::new(InstantTransport {
            dir: tempfile::tempdir().unwrap(),
            downloads: StdMutex::new(HashMap::new()),
        });
        let scheduler = DownloadScheduler::new(
            transport.clone(),
            SchedulerConfig {
                download_limit: 3,
                eviction_idle_sweeps: 1,
            },
        );
        (ContentCacheManager::new(scheduler), transport)
    }

    async fn wait_cached(manager: &ContentCacheManager, expected: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while manager.scheduler().snapshot().await.cached < expected {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("images were not cached in time");
    }

    #[tokio::test]
    async fn test_cache_contents_requires_initialization() {
        let (manager, _) = setup();
        let err = manager
            .cache_contents("/content/home", &[content("a", Some("a.png"))])
            .await
            .unwrap_err();
        assert_eq!(err, ContentError::CacheNotInitialized);
    }

    #[tokio::test]
    async fn test_start_caching_section_downloads_images_once() {
        let (manager, transport) = setup();
        manager.initialize_cache().await;
        manager
            .cache_contents(
                "/content/home",
                &[content("a", Some("a.png")), content("b", None), content("c", Some("c.png"))],
            )
            .await
            .unwrap();

        manager.start_caching_section("/content/home").await;
        manager.start_caching_section("/content/home").await;
        wait_cached(&manager, 2).await;

        let downloads = transport.downloads.lock().unwrap().clone();
        assert_eq!(downloads.len(), 2);
        assert!(downloads.values().all(|count| *count == 1));
    }

    #[tokio::test]
    async fn test_start_caching_covers_every_pending_section() {
        let (manager, _) = setup();
        manager.initialize_cache().await;
        manager
            .cache_sections(vec!["/content/a".to_string(), "/content/b".to_string()])
            .await;
        manager
            .cache_contents("/content/a", &[content("a", Some("a.png"))])
            .await
            .unwrap();
        manager
            .cache_contents("/content/b", &[content("b", Some("b.png"))])
            .await
            .unwrap();

        manager.start_caching().await;
        wait_cached(&manager, 2).await;
    }

    #[tokio::test]
    async fn test_replacing_contents_evicts_orphaned_images() {
        let (manager, _) = setup();
        manager.initialize_cache().await;
        manager
            .cache_contents("/content/a", &[content("old", Some("old.png"))])
            .await
            .unwrap();
        manager.start_caching_section("/content/a").await;
        wait_cached(&manager, 1).await;

        manager
            .cache_contents("/content/a", &[content("new", Some("new.png"))])
            .await
            .unwrap();
        assert_eq!(manager.scheduler().snapshot().await.cached, 0);
    }

    #[tokio::test]
    async fn test_image_of_appended_page_survives_sweeps() {
        let (manager, _) = setup();
        manager.initialize_cache().await;
        manager
            .cache_contents("/content/a", &[content("p1", Some("p1.png"))])
            .await
            .unwrap();
        manager
            .append_contents("/content/a", &[content("p2", Some("p2.png"))])
            .await
            .unwrap();

        let page_two = manager
            .scheduler()
            .cached_image("p2.png", "p2", ImagePriority::High)
            .await
            .unwrap();
        let detail = manager
            .scheduler()
            .cached_image("detail.png", "detail", ImagePriority::High)
            .await
            .unwrap();

        let sections = [
            ("/content/b", "b", "b.png"),
            ("/content/c", "c", "c.png"),
            ("/content/b", "b2", "b2.png"),
        ];
        for (path, id, image) in sections {
            manager
                .cache_contents(path, &[content(id, Some(image))])
                .await
                .unwrap();
        }

        assert!(page_two.exists());
        assert!(detail.exists());
        assert_eq!(manager.scheduler().snapshot().await.cached, 2);
    }

    #[tokio::test]
    async fn test_replacing_section_retires_appended_page() {
        let (manager, _) = setup();
        manager.initialize_cache().await;
        manager
            .cache_contents("/content/a", &[content("p1", None)])
            .await
            .unwrap();
        manager
            .append_contents("/content/a", &[content("p2", Some("p2.png"))])
            .await
            .unwrap();
        let page_two = manager
            .scheduler()
            .cached_image("p2.png", "p2", ImagePriority::High)
            .await
            .unwrap();

        manager
            .cache_contents("/content/a", &[content("p1", None)])
            .await
            .unwrap();

        assert!(!page_two.exists());
        assert_eq!(manager.scheduler().snapshot().await.cached, 0);
    }

    #[tokio::test]
    async fn test_appended_page_of_started_section_is_queued() {
        let (manager, transport) = setup();
        manager.initialize_cache().await;
        manager
            .cache_contents("/content/a", &[content("p1", Some("p1.png"))])
            .await
            .unwrap();
        manager.start_caching_section("/content/a").await;
        wait_cached(&manager, 1).await;

        manager
            .append_contents("/content/a", &[content("p2", Some("p2.png"))])
            .await
            .unwrap();
        wait_cached(&manager, 2).await;
        assert!(transport.downloads.lock().unwrap().contains_key("p2.png"));
    }

    #[tokio::test]
    async fn test_uninitialized_cache_ignores_start() {
        let (manager, transport) = setup();
        manager.cache_sections(vec!["/content/a".to_string()]).await;
        manager.start_caching().await;
        assert!(transport.downloads.lock().unwrap().is_empty());
    }
}
