//! Content API client.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use ocm_core::{ContentError, RawAction, RawContentList, RawMenus, RemoteContentService};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};
use crate::http::{HttpBackend, ReqwestBackend};

/// Content API client using the reqwest HTTP backend.
pub type DefaultContentApiClient = ContentApiClient<ReqwestBackend>;

/// [`RemoteContentService`] over the content API.
///
/// Every request runs under the current cancellation token;
/// `cancel_active_requests` fires it and installs a fresh one, so later
/// requests are unaffected.
pub struct ContentApiClient<B: HttpBackend> {
    backend: B,
    base_url: String,
    cancel: Mutex<CancellationToken>,
}

impl DefaultContentApiClient {
    pub fn new(config: &HttpClientConfig) -> HttpResult<Self> {
        Ok(Self::with_backend(config, ReqwestBackend::new(config)?))
    }
}

impl<B: HttpBackend> ContentApiClient<B> {
    /// Create a client with a custom backend.
    pub fn with_backend(config: &HttpClientConfig, backend: B) -> Self {
        Self {
            backend,
            base_url: config.base_url.clone(),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    fn endpoint(&self, path: &str) -> HttpResult<Url> {
        let raw = if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        };
        Url::parse(&raw).map_err(|e| HttpError::invalid_url(&raw, e))
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn get(&self, url: Url) -> Result<serde_json::Value, ContentError> {
        let token = self.current_token();
        tracing::debug!(target: "ocm.http", url = %url, "GET");
        self.backend
            .get_json(&url, &token)
            .await
            .map_err(ContentError::from)
    }
}

#[async_trait]
impl<B: HttpBackend> RemoteContentService for ContentApiClient<B> {
    async fn get_menus(&self) -> Result<RawMenus, ContentError> {
        let url = self.endpoint("/menus")?;
        self.get(url).await.map(RawMenus)
    }

    async fn get_content_list(
        &self,
        path: &str,
        page: u32,
        items: u32,
    ) -> Result<RawContentList, ContentError> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("items", &items.to_string());
        self.get(url).await.map(RawContentList)
    }

    async fn search_content_list(&self, query: &str) -> Result<RawContentList, ContentError> {
        let mut url = self.endpoint("/search")?;
        url.query_pairs_mut().append_pair("search", query);
        self.get(url).await.map(RawContentList)
    }

    async fn get_element(&self, identifier: &str) -> Result<RawAction, ContentError> {
        let url = self.endpoint(identifier)?;
        let payload = self.get(url).await?;
        Ok(RawAction::new(identifier, payload))
    }

    fn cancel_active_requests(&self) {
        let previous = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        previous.cancel();
        tracing::info!(target: "ocm.http", "Cancelled active requests");
    }
}
