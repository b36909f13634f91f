//! HTTP backend abstraction for the content API.
//!
//! The client is generic over [`HttpBackend`] so that it can be driven by a
//! fake in tests. The production implementation uses reqwest with automatic
//! retry for transient errors.

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};

// ============================================================================
// HTTP Backend Trait
// ============================================================================

/// Fetches JSON documents.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Fetch the JSON document at `url`.
    ///
    /// Resolves to [`HttpError::Cancelled`] as soon as `cancel` fires.
    async fn get_json(&self, url: &Url, cancel: &CancellationToken) -> HttpResult<Value>;
}

/// Build the reqwest client described by `config`.
pub(crate) fn build_client(config: &HttpClientConfig) -> HttpResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.clone())
        .build()?)
}

/// Run `future` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    future: impl std::future::Future<Output = HttpResult<T>>,
) -> HttpResult<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HttpError::Cancelled),
        result = future => result,
    }
}

// ============================================================================
// Reqwest Backend
// ============================================================================

/// Production HTTP backend using reqwest with retry logic.
///
/// Implements exponential backoff for transient server errors (5xx)
/// and network errors.
pub struct ReqwestBackend {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl ReqwestBackend {
    pub fn new(config: &HttpClientConfig) -> HttpResult<Self> {
        Ok(Self {
            client: build_client(config)?,
            config: config.clone(),
        })
    }

    /// Build a request with optional authentication.
    fn build_request(&self, url: &Url) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url.as_str());
        if let Some(ref token) = self.config.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn fetch_once(&self, url: &Url) -> HttpResult<Value> {
        let response = self.build_request(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn get_json(&self, url: &Url, cancel: &CancellationToken) -> HttpResult<Value> {
        let mut retry = 0;
        loop {
            match cancellable(cancel, self.fetch_once(url)).await {
                Err(e) if e.is_transient() && retry < self.config.max_retries => {
                    retry += 1;
                    let delay = self.config.backoff(retry);
                    tracing::debug!(
                        target: "ocm.http",
                        url = %url,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request"
                    );
                    cancellable(cancel, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
                result => return result,
            }
        }
    }
}
