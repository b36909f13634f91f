//! Shared fakes for coordinator tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use serde_json::{Value, json};
use tokio::sync::{Semaphore, watch};

use ocm_core::{
    Action, Content, ContentCachePort, ContentError, ContentList, ContentStore, Menu, RawAction,
    RawContentList, RawMenus, ReachabilityMonitor, RemoteContentService, RepositoryError, Section,
};
use ocm_sync::{CoordinatorConfig, SyncCoordinator, SyncCoordinatorDeps, build_sync_coordinator};

mock! {
    pub Reachability {}

    impl ReachabilityMonitor for Reachability {
        fn is_reachable(&self) -> bool;
    }
}

pub fn reachability(reachable: bool) -> Arc<MockReachability> {
    let mut mock = MockReachability::new();
    mock.expect_is_reachable().return_const(reachable);
    Arc::new(mock)
}

// =============================================================================
// Documents
// =============================================================================

pub fn menus_document() -> Value {
    json!({
        "menus": [{
            "slug": "main",
            "elements": [
                { "slug": "home", "elementUrl": "/element/home", "sectionView": { "text": "Home" } },
                { "slug": "news", "elementUrl": "/element/news", "sectionView": { "text": "News" } }
            ]
        }],
        "elementsCache": {
            "/element/home": { "type": "content", "render": { "contentUrl": "/content/home" } },
            "/element/news": { "type": "content", "render": { "contentUrl": "/content/news" } }
        }
    })
}

pub fn content_document(slugs: &[&str], expire_at: Option<DateTime<Utc>>) -> Value {
    let elements: Vec<Value> = slugs
        .iter()
        .map(|slug| {
            json!({
                "slug": slug,
                "elementUrl": format!("/element/{slug}"),
                "name": slug,
                "sectionView": { "imageUrl": format!("https://img.example/{slug}.png") }
            })
        })
        .collect();
    let actions: serde_json::Map<String, Value> = slugs
        .iter()
        .map(|slug| {
            (
                format!("/element/{slug}"),
                json!({ "type": "deepLink", "render": { "uri": format!("app://{slug}") } }),
            )
        })
        .collect();
    json!({
        "content": { "slug": "list", "type": "carousel", "elements": elements },
        "elementsCache": actions,
        "expireAt": expire_at,
        "contentVersion": "v1"
    })
}

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    menus: Vec<Menu>,
    sections: HashMap<String, Section>,
    section_paths: HashMap<String, String>,
    actions: HashMap<String, Value>,
    lists: HashMap<String, ContentList>,
}

/// In-memory [`ContentStore`] with the pagination rules of the real one.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    pub cleaned: AtomicUsize,
    pub saved_lists: Mutex<Vec<String>>,
}

impl FakeStore {
    pub fn seed_list(&self, raw: Value, path: &str) {
        let parsed = RawContentList(raw).parse(path, 1).unwrap();
        self.state
            .lock()
            .unwrap()
            .lists
            .insert(path.to_string(), parsed.list);
    }

    pub fn stored_len(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .lists
            .get(path)
            .map_or(0, ContentList::len)
    }

    pub fn has_action(&self, identifier: &str) -> bool {
        self.state.lock().unwrap().actions.contains_key(identifier)
    }
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn save_menus(&self, menus: &[Menu]) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().menus = menus.to_vec();
        Ok(())
    }

    async fn save_sections(&self, sections: &[Section], _menu_slug: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        for section in sections {
            state
                .sections
                .insert(section.element_url.clone(), section.clone());
        }
        Ok(())
    }

    async fn save_action_in_section(
        &self,
        action: &RawAction,
        section: &Section,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(path) = action.parse().and_then(|a| a.content_path().map(str::to_string)) {
            state.section_paths.insert(path, section.element_url.clone());
        }
        state
            .actions
            .insert(action.identifier.clone(), action.payload.clone());
        Ok(())
    }

    async fn save_content(
        &self,
        payload: &RawContentList,
        path: &str,
        _expiration_date: Option<DateTime<Utc>>,
        _content_version: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let parsed = payload
            .parse(path, 1)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        self.state
            .lock()
            .unwrap()
            .lists
            .insert(path.to_string(), parsed.list);
        self.saved_lists.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn append_content(
        &self,
        payload: &RawContentList,
        path: &str,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let parsed = payload
            .parse(path, 1)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
        let mut state = self.state.lock().unwrap();
        let list = state
            .lists
            .get_mut(path)
            .ok_or_else(|| RepositoryError::NotFound(path.to_string()))?;
        list.contents.extend(parsed.list.contents);
        list.expiration_date = expiration_date;
        Ok(())
    }

    async fn save_action(
        &self,
        action: &RawAction,
        _content_path: Option<&str>,
    ) -> Result<(), RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .actions
            .insert(action.identifier.clone(), action.payload.clone());
        Ok(())
    }

    async fn load_menus(&self) -> Result<Vec<Menu>, RepositoryError> {
        Ok(self.state.lock().unwrap().menus.clone())
    }

    async fn load_action(&self, identifier: &str) -> Result<Option<Action>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .actions
            .get(identifier)
            .and_then(|json| Action::from_json(identifier, json)))
    }

    async fn load_content_list(
        &self,
        path: &str,
        valid_at: DateTime<Utc>,
        page: u32,
        items: u32,
    ) -> Result<Option<ContentList>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let Some(stored) = state.lists.get(path) else {
            return Ok(None);
        };
        let visible: Vec<Content> = stored
            .clone()
            .visible_at(valid_at)
            .contents;
        let contents: Vec<Content> = if items == 0 {
            visible
        } else {
            let offset = (page.saturating_sub(1) * items) as usize;
            visible.into_iter().skip(offset).take(items as usize).collect()
        };
        if page > 1 && contents.is_empty() {
            return Ok(None);
        }
        Ok(Some(ContentList {
            page,
            contents,
            ..stored.clone()
        }))
    }

    async fn load_content_version(&self, path: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .lists
            .get(path)
            .and_then(|list| list.content_version.clone()))
    }

    async fn load_section_for_content(&self, path: &str) -> Result<Option<Section>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .section_paths
            .get(path)
            .and_then(|url| state.sections.get(url))
            .cloned())
    }

    async fn load_section_for_action(&self, identifier: &str) -> Result<Option<Section>, RepositoryError> {
        Ok(self.state.lock().unwrap().sections.get(identifier).cloned())
    }

    async fn clean_database(&self) -> Result<(), RepositoryError> {
        *self.state.lock().unwrap() = StoreState::default();
        self.cleaned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Remote
// =============================================================================

/// Remote service serving canned documents.
///
/// While held, content-list calls block until released or cancelled.
pub struct FakeRemote {
    menus: Mutex<Value>,
    lists: Mutex<HashMap<(String, u32), Value>>,
    elements: Mutex<HashMap<String, Value>>,
    pub menu_calls: AtomicUsize,
    pub list_calls: Mutex<Vec<(String, u32)>>,
    held: AtomicBool,
    gate: Semaphore,
    cancel: watch::Sender<u64>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            menus: Mutex::new(menus_document()),
            lists: Mutex::new(HashMap::new()),
            elements: Mutex::new(HashMap::new()),
            menu_calls: AtomicUsize::new(0),
            list_calls: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            cancel: watch::channel(0).0,
        }
    }
}

impl FakeRemote {
    pub fn with_list(self, path: &str, page: u32, document: Value) -> Self {
        self.set_list(path, page, document);
        self
    }

    pub fn set_list(&self, path: &str, page: u32, document: Value) {
        self.lists
            .lock()
            .unwrap()
            .insert((path.to_string(), page), document);
    }

    pub fn with_element(self, identifier: &str, document: Value) -> Self {
        self.elements
            .lock()
            .unwrap()
            .insert(identifier.to_string(), document);
        self
    }

    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1024);
    }

    pub fn list_calls(&self) -> Vec<(String, u32)> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Wait until `count` content-list calls have been made.
    pub async fn wait_list_calls(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.list_calls.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("content list was not requested in time");
    }

    async fn gated<T>(&self, value: Result<T, ContentError>) -> Result<T, ContentError> {
        let mut cancelled = self.cancel.subscribe();
        if !self.held.load(Ordering::SeqCst) {
            return value;
        }
        tokio::select! {
            permit = self.gate.acquire() => {
                drop(permit);
                value
            }
            _ = cancelled.changed() => Err(ContentError::Cancelled),
        }
    }
}

#[async_trait]
impl RemoteContentService for FakeRemote {
    async fn get_menus(&self) -> Result<RawMenus, ContentError> {
        self.menu_calls.fetch_add(1, Ordering::SeqCst);
        let menus = self.menus.lock().unwrap().clone();
        self.gated(Ok(RawMenus(menus))).await
    }

    async fn get_content_list(
        &self,
        path: &str,
        page: u32,
        _items: u32,
    ) -> Result<RawContentList, ContentError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((path.to_string(), page));
        let document = self
            .lists
            .lock()
            .unwrap()
            .get(&(path.to_string(), page))
            .cloned()
            .ok_or_else(|| ContentError::network_with_status("not found", 404));
        self.gated(document.map(RawContentList)).await
    }

    async fn search_content_list(&self, query: &str) -> Result<RawContentList, ContentError> {
        self.get_content_list(&format!("/search/{query}"), 1, 0).await
    }

    async fn get_element(&self, identifier: &str) -> Result<RawAction, ContentError> {
        self.elements
            .lock()
            .unwrap()
            .get(identifier)
            .cloned()
            .map(|payload| RawAction::new(identifier, payload))
            .ok_or_else(|| ContentError::network_with_status("not found", 404))
    }

    fn cancel_active_requests(&self) {
        self.cancel.send_modify(|generation| *generation += 1);
    }
}

// =============================================================================
// Image layer
// =============================================================================

/// Records what the coordinator tells the image layer.
#[derive(Default)]
pub struct RecordingCache {
    pub resets: AtomicUsize,
    pub sections: Mutex<Vec<String>>,
    pub contents: Mutex<Vec<(String, usize)>>,
    pub appended: Mutex<Vec<(String, usize)>>,
    pub started_sections: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentCachePort for RecordingCache {
    async fn initialize_cache(&self) {}

    async fn reset_cache(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    async fn cache_sections(&self, paths: Vec<String>) {
        self.sections.lock().unwrap().extend(paths);
    }

    async fn cache_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError> {
        self.contents
            .lock()
            .unwrap()
            .push((path.to_string(), contents.len()));
        Ok(())
    }

    async fn append_contents(&self, path: &str, contents: &[Content]) -> Result<(), ContentError> {
        self.appended
            .lock()
            .unwrap()
            .push((path.to_string(), contents.len()));
        Ok(())
    }

    async fn start_caching_section(&self, path: &str) {
        self.started_sections.lock().unwrap().push(path.to_string());
    }

    async fn start_caching(&self) {}
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub coordinator: Arc<SyncCoordinator>,
    pub store: Arc<FakeStore>,
    pub remote: Arc<FakeRemote>,
    pub cache: Arc<RecordingCache>,
}

pub fn harness(remote: FakeRemote, offline_support: bool, reachable: bool) -> Harness {
    let store = Arc::new(FakeStore::default());
    let remote = Arc::new(remote);
    let cache = Arc::new(RecordingCache::default());
    let coordinator = build_sync_coordinator(SyncCoordinatorDeps {
        store: store.clone(),
        remote: remote.clone(),
        reachability: reachability(reachable),
        content_cache: cache.clone(),
        config: CoordinatorConfig { offline_support },
    });
    Harness {
        coordinator,
        store,
        remote,
        cache,
    }
}
