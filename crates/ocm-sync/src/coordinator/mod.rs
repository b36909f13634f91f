//! Sync coordinator.
//!
//! Decides for every menu, content-list and action request whether it is
//! served from the store, from memory or from the network, and runs network
//! content-list fetches one at a time through the coalescing queue.
//!
//! # Concurrency Model
//!
//! - Single long-lived runner (started lazily, never reset) drains the
//!   content-list queue; `Notify` wakes it when work arrives
//! - Menu fetches are coalesced separately: the first caller spawns the
//!   fetch, later callers only register a waiter
//! - Bookkeeping lives behind one `Mutex`; it is never held across a
//!   network or store call

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, Notify, oneshot};

use ocm_core::{
    Action, ContentCachePort, ContentError, ContentList, ContentStore, DataSource, MenuLoad,
    ParsedContentList, RawContentList, RawMenus, ReachabilityMonitor, RemoteContentService,
    Section, SyncSettings,
};

use crate::request_queue::{PendingContentListRequest, RequestKey, RequestQueue, StartedRequest};
use crate::routing::{self, RoutingContext};

type ContentWaiter = oneshot::Sender<Result<ContentList, ContentError>>;
type MenuWaiter = oneshot::Sender<Result<MenuLoad, ContentError>>;

/// Configuration for the sync coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Cache-first reads and persistence of fetched content.
    pub offline_support: bool,
}

impl From<&SyncSettings> for CoordinatorConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            offline_support: settings.offline_support_enabled(),
        }
    }
}

/// Dependencies for creating a sync coordinator.
pub struct SyncCoordinatorDeps {
    pub store: Arc<dyn ContentStore>,
    pub remote: Arc<dyn RemoteContentService>,
    pub reachability: Arc<dyn ReachabilityMonitor>,
    /// Image layer signalled when sections become visible.
    pub content_cache: Arc<dyn ContentCachePort>,
    pub config: CoordinatorConfig,
}

/// Build a sync coordinator from its dependencies.
pub fn build_sync_coordinator(deps: SyncCoordinatorDeps) -> Arc<SyncCoordinator> {
    Arc::new(SyncCoordinator {
        store: deps.store,
        remote: deps.remote,
        reachability: deps.reachability,
        content_cache: deps.content_cache,
        config: deps.config,
        state: Mutex::new(CoordinatorState::default()),
        queue_notify: Notify::new(),
        runner_started: AtomicBool::new(false),
    })
}

#[derive(Default)]
struct CoordinatorState {
    requests: RequestQueue<ContentWaiter>,
    /// `Some` while a menu fetch is in flight.
    menu_waiters: Option<Vec<MenuWaiter>>,
    /// Preloaded page-1 payloads by path.
    preloaded: HashMap<String, RawContentList>,
    /// Actions delivered by responses that were not persisted.
    actions: HashMap<String, Value>,
}

/// Central orchestrator of content synchronization.
pub struct SyncCoordinator {
    store: Arc<dyn ContentStore>,
    remote: Arc<dyn RemoteContentService>,
    reachability: Arc<dyn ReachabilityMonitor>,
    content_cache: Arc<dyn ContentCachePort>,
    config: CoordinatorConfig,
    state: Mutex<CoordinatorState>,
    queue_notify: Notify,
    runner_started: AtomicBool,
}

impl SyncCoordinator {
    pub const fn config(&self) -> CoordinatorConfig {
        self.config
    }

    // =========================================================================
    // Menus
    // =========================================================================

    /// Load the menus.
    pub async fn load_menus(self: &Arc<Self>, force: bool) -> Result<MenuLoad, ContentError> {
        let cached = if self.config.offline_support {
            self.store.load_menus().await.unwrap_or_else(|e| {
                tracing::warn!(target: "ocm.sync", error = %e, "Failed to read cached menus");
                Vec::new()
            })
        } else {
            Vec::new()
        };

        match routing::menus_source(self.context(force), cached) {
            DataSource::FromCache(menus) | DataSource::FromMemory(menus) => {
                tracing::debug!(target: "ocm.sync", menus = menus.len(), "Menus served from cache");
                Ok(MenuLoad {
                    menus,
                    from_cache: true,
                })
            }
            DataSource::FromNetwork => self.fetch_menus().await,
        }
    }

    async fn fetch_menus(self: &Arc<Self>) -> Result<MenuLoad, ContentError> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut state = self.state.lock().await;
            if let Some(waiters) = state.menu_waiters.as_mut() {
                waiters.push(tx);
                false
            } else {
                state.menu_waiters = Some(vec![tx]);
                true
            }
        };

        if start {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move { coordinator.run_menu_fetch().await });
        } else {
            tracing::debug!(target: "ocm.sync", "Joined in-flight menu fetch");
        }

        rx.await
            .unwrap_or_else(|_| Err(ContentError::unknown("menu request dropped")))
    }

    async fn run_menu_fetch(&self) {
        tracing::info!(target: "ocm.sync", "Fetching menus");
        let outcome = match self.remote.get_menus().await {
            Ok(raw) => self.persist_menus(&raw).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            if !e.is_cancelled() {
                tracing::warn!(target: "ocm.sync", error = %e, "Menu fetch failed");
            }
        }

        let waiters = self.state.lock().await.menu_waiters.take().unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn persist_menus(&self, raw: &RawMenus) -> Result<MenuLoad, ContentError> {
        let parsed = raw.parse()?;

        if !self.config.offline_support {
            // Without offline support nothing persisted earlier may survive.
            if let Err(e) = self.store.clean_database().await {
                tracing::warn!(target: "ocm.sync", error = %e, "Failed to clean the store");
            }
            self.content_cache.reset_cache().await;
        }

        if let Err(e) = self.store.save_menus(&parsed.menus).await {
            tracing::warn!(target: "ocm.sync", error = %e, "Failed to persist menus");
        }
        for menu in &parsed.menus {
            if let Err(e) = self.store.save_sections(&menu.sections, &menu.slug).await {
                tracing::warn!(target: "ocm.sync", menu = %menu.slug, error = %e, "Failed to persist sections");
            }
            for section in &menu.sections {
                let Some(action) = parsed.action_for(&section.element_url) else {
                    continue;
                };
                if let Err(e) = self.store.save_action_in_section(&action, section).await {
                    tracing::warn!(
                        target: "ocm.sync",
                        section = %section.element_url,
                        error = %e,
                        "Failed to persist section action"
                    );
                }
            }
        }

        if self.config.offline_support {
            if let Some(menu) = parsed.largest_menu() {
                let paths: Vec<String> = menu
                    .sections
                    .iter()
                    .filter_map(|section| parsed.action_for(&section.element_url))
                    .filter_map(|action| action.parse())
                    .filter_map(|action| action.content_path().map(str::to_string))
                    .collect();
                self.content_cache.cache_sections(paths).await;
            }
        }

        tracing::info!(target: "ocm.sync", menus = parsed.menus.len(), "Menus fetched");
        Ok(MenuLoad {
            menus: parsed.menus,
            from_cache: false,
        })
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Load the action identified by `identifier` (element url or slug).
    pub async fn load_element(&self, force: bool, identifier: &str) -> Result<Action, ContentError> {
        let cached = self.cached_action(identifier).await;
        match routing::element_source(self.context(force), cached) {
            DataSource::FromCache(action) | DataSource::FromMemory(action) => Ok(action),
            DataSource::FromNetwork => self.fetch_element(identifier).await,
        }
    }

    async fn cached_action(&self, identifier: &str) -> Option<Action> {
        let in_memory = self.state.lock().await.actions.get(identifier).cloned();
        if let Some(action) = in_memory.and_then(|json| Action::from_json(identifier, &json)) {
            return Some(action);
        }

        self.store.load_action(identifier).await.unwrap_or_else(|e| {
            tracing::warn!(target: "ocm.sync", identifier, error = %e, "Failed to read cached action");
            None
        })
    }

    async fn fetch_element(&self, identifier: &str) -> Result<Action, ContentError> {
        tracing::info!(target: "ocm.sync", identifier, "Fetching action");
        let raw = self.remote.get_element(identifier).await?;
        let action = raw
            .parse()
            .ok_or_else(|| ContentError::parsing(format!("unsupported action {identifier}")))?;

        if let Err(e) = self.store.save_action(&raw, None).await {
            tracing::warn!(target: "ocm.sync", identifier, error = %e, "Failed to persist action");
        }
        Ok(action)
    }

    // =========================================================================
    // Content lists
    // =========================================================================

    /// Load page `page` (1-based, `items` per page) of the list under `path`.
    pub async fn load_content_list(
        self: &Arc<Self>,
        force: bool,
        path: &str,
        page: u32,
        items: u32,
    ) -> Result<ContentList, ContentError> {
        let now = Utc::now();

        let source = match self.take_preloaded(path, page, now).await {
            Some(list) => DataSource::FromMemory(list),
            None => {
                let cached = if self.config.offline_support {
                    self.cached_content(path, page, items, now).await
                } else {
                    None
                };
                routing::content_source(self.context(force), page, items, cached, now)
            }
        };

        match source {
            DataSource::FromCache(list) | DataSource::FromMemory(list) => {
                tracing::debug!(target: "ocm.sync", path, page, "Content served locally");
                self.signal_section_caching(path);
                Ok(list)
            }
            DataSource::FromNetwork => self.enqueue(path, page, items, false).await,
        }
    }

    /// Fetch a page into memory ahead of navigation.
    ///
    /// The payload is held until the next page-1 load of `path` consumes it.
    pub async fn preload_content_list(
        self: &Arc<Self>,
        path: &str,
        page: u32,
        items: u32,
    ) -> Result<ContentList, ContentError> {
        self.enqueue(path, page, items, true).await
    }

    /// Search content. Always hits the network; results are not persisted.
    pub async fn load_content_list_matching(
        &self,
        query: &str,
    ) -> Result<ContentList, ContentError> {
        tracing::info!(target: "ocm.sync", query, "Searching content");
        let raw = self.remote.search_content_list(query).await?;
        let parsed = raw.parse(query, 1)?;
        self.remember_actions(&parsed).await;
        Ok(parsed.list.visible_at(Utc::now()))
    }

    async fn cached_content(
        &self,
        path: &str,
        page: u32,
        items: u32,
        now: DateTime<Utc>,
    ) -> Option<ContentList> {
        self.store
            .load_content_list(path, now, page, items)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(target: "ocm.sync", path, error = %e, "Failed to read cached content");
                None
            })
    }

    /// Consume and persist a preloaded page-1 payload for `path`.
    async fn take_preloaded(&self, path: &str, page: u32, now: DateTime<Utc>) -> Option<ContentList> {
        if page != 1 {
            return None;
        }
        let raw = self.state.lock().await.preloaded.remove(path)?;
        let parsed = match raw.parse(path, 1) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(target: "ocm.sync", path, error = %e, "Discarding unreadable preload");
                return None;
            }
        };

        self.persist_page(&raw, &parsed, path).await;
        tracing::debug!(target: "ocm.sync", path, "Preloaded content consumed");
        Some(parsed.list.visible_at(now))
    }

    async fn enqueue(
        self: &Arc<Self>,
        path: &str,
        page: u32,
        items: u32,
        is_preload: bool,
    ) -> Result<ContentList, ContentError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.state.lock().await;
            state
                .requests
                .add_request(PendingContentListRequest::new(path, page, items, is_preload, tx));
            tracing::debug!(
                target: "ocm.sync",
                path,
                page,
                preload = is_preload,
                pending = state.requests.pending_len(),
                "Content request queued"
            );
        }

        self.ensure_runner();
        self.queue_notify.notify_one();

        rx.await
            .unwrap_or_else(|_| Err(ContentError::unknown("content request dropped")))
    }

    /// Ensure the queue runner is started.
    ///
    /// Idempotent; the runner lives as long as the coordinator.
    fn ensure_runner(self: &Arc<Self>) {
        if self
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let coordinator = Arc::clone(self);
            tokio::spawn(async move {
                coordinator.run_loop().await;
            });
        }
    }

    /// Drain the content-list queue, one fetch at a time.
    async fn run_loop(&self) {
        let mut busy = false;
        loop {
            let next = self.state.lock().await.requests.next_request();
            if let Some(request) = next {
                busy = true;
                self.execute(request).await;
                continue;
            }

            if busy {
                busy = false;
                if self.config.offline_support {
                    tracing::debug!(target: "ocm.sync", "Queue drained, caching remaining sections");
                    let cache = Arc::clone(&self.content_cache);
                    tokio::spawn(async move { cache.start_caching().await });
                }
            }
            self.queue_notify.notified().await;
        }
    }

    async fn execute(&self, request: StartedRequest) {
        let StartedRequest {
            key,
            items,
            is_preload,
        } = request;
        tracing::info!(target: "ocm.sync", path = %key.path, page = key.page, "Fetching content list");

        let outcome = match self.remote.get_content_list(&key.path, key.page, items).await {
            Ok(raw) => self.handle_content(&key, items, is_preload, raw).await,
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(list) => tracing::info!(
                target: "ocm.sync",
                path = %key.path,
                page = key.page,
                contents = list.len(),
                "Content list fetched"
            ),
            Err(e) if e.is_cancelled() => {
                tracing::debug!(target: "ocm.sync", path = %key.path, "Content fetch cancelled");
            }
            Err(e) => {
                tracing::warn!(target: "ocm.sync", path = %key.path, error = %e, "Content fetch failed");
            }
        }

        let waiters = self.state.lock().await.requests.finish(&key);
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn handle_content(
        &self,
        key: &RequestKey,
        items: u32,
        is_preload: bool,
        raw: RawContentList,
    ) -> Result<ContentList, ContentError> {
        let now = Utc::now();
        let parsed = raw.parse(&key.path, key.page)?;

        if !self.config.offline_support {
            self.remember_actions(&parsed).await;
            return Ok(parsed.list.visible_at(now));
        }

        if key.page > 1 {
            if let Err(e) = self
                .store
                .append_content(&raw, &key.path, parsed.list.expiration_date)
                .await
            {
                tracing::warn!(target: "ocm.sync", path = %key.path, error = %e, "Failed to append page");
            }
            self.persist_actions(&parsed, &key.path).await;
            if let Err(e) = self
                .content_cache
                .append_contents(&key.path, &parsed.list.contents)
                .await
            {
                tracing::debug!(target: "ocm.sync", path = %key.path, error = %e, "Page images not registered for caching");
            }

            let content_version = parsed.list.content_version.clone();
            let mut list = self
                .cached_content(&key.path, key.page, items, now)
                .await
                .unwrap_or_else(|| parsed.list.visible_at(now));
            list.content_version = content_version;
            return Ok(list);
        }

        if is_preload {
            let list = parsed.list.clone().visible_at(now);
            self.cache_contents(&key.path, &list).await;
            self.state
                .lock()
                .await
                .preloaded
                .insert(key.path.clone(), raw);
            return Ok(list);
        }

        self.persist_page(&raw, &parsed, &key.path).await;
        Ok(parsed.list.visible_at(now))
    }

    /// Persist a page-1 payload with its actions and register its images.
    async fn persist_page(&self, raw: &RawContentList, parsed: &ParsedContentList, path: &str) {
        let list = &parsed.list;
        if let Err(e) = self
            .store
            .save_content(
                raw,
                path,
                list.expiration_date,
                list.content_version.as_deref(),
            )
            .await
        {
            tracing::warn!(target: "ocm.sync", path, error = %e, "Failed to persist content list");
        }
        self.persist_actions(parsed, path).await;
        self.cache_contents(path, list).await;
    }

    async fn persist_actions(&self, parsed: &ParsedContentList, path: &str) {
        for action in parsed.raw_actions() {
            if let Err(e) = self.store.save_action(&action, Some(path)).await {
                tracing::warn!(
                    target: "ocm.sync",
                    identifier = %action.identifier,
                    error = %e,
                    "Failed to persist action"
                );
            }
        }
    }

    async fn cache_contents(&self, path: &str, list: &ContentList) {
        if let Err(e) = self.content_cache.cache_contents(path, &list.contents).await {
            tracing::debug!(target: "ocm.sync", path, error = %e, "Images not registered for caching");
        }
    }

    async fn remember_actions(&self, parsed: &ParsedContentList) {
        let mut state = self.state.lock().await;
        state.actions.extend(
            parsed
                .actions
                .iter()
                .map(|(identifier, json)| (identifier.clone(), json.clone())),
        );
    }

    fn signal_section_caching(&self, path: &str) {
        let cache = Arc::clone(&self.content_cache);
        let path = path.to_string();
        tokio::spawn(async move { cache.start_caching_section(&path).await });
    }

    // =========================================================================
    // Lookups and cancellation
    // =========================================================================

    /// The section whose content list lives under `path`.
    pub async fn load_section(&self, path: &str) -> Result<Section, ContentError> {
        self.store
            .load_section_for_content(path)
            .await?
            .ok_or(ContentError::NotInCache)
    }

    /// The section opened by the action `identifier`.
    pub async fn load_section_for_action(&self, identifier: &str) -> Result<Section, ContentError> {
        self.store
            .load_section_for_action(identifier)
            .await?
            .ok_or(ContentError::NotInCache)
    }

    /// The content version persisted with the list under `path`.
    pub async fn load_content_version(&self, path: &str) -> Result<String, ContentError> {
        self.store
            .load_content_version(path)
            .await?
            .ok_or(ContentError::NotInCache)
    }

    /// Cancel the network calls in flight and fail every queued request.
    ///
    /// Every affected caller receives [`ContentError::Cancelled`].
    pub async fn cancel_all_requests(&self) {
        self.remote.cancel_active_requests();
        let waiters = self.state.lock().await.requests.cancel_pending();
        tracing::info!(target: "ocm.sync", cancelled = waiters.len(), "Cancelled queued requests");
        for waiter in waiters {
            let _ = waiter.send(Err(ContentError::Cancelled));
        }
    }

    fn context(&self, force: bool) -> RoutingContext {
        RoutingContext {
            offline_support: self.config.offline_support,
            reachable: self.reachability.is_reachable(),
            force,
        }
    }
}
