//! Resumable image transfers.
//!
//! Each image URL maps to `<sha256>.img` in the cache directory. Bytes are
//! streamed into `<sha256>.img.part` and the file is renamed once complete,
//! so a `.part` file is always a prefix a later transfer can continue with a
//! `Range` request.
//!
//! # Pause, cancel and supersede
//!
//! Transfers are registered synchronously by `begin_download`, so a pause
//! or cancel issued right after registration holds even if the `download`
//! future has not run yet. A paused transfer drops its connection and waits
//! for `resume_downloads`. A cancelled or superseded transfer resolves to
//! `Cancelled`; its `.part` file stays for the next transfer of the path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use ocm_core::{DownloadTransport, TransferId, TransportError};

use crate::config::HttpClientConfig;
use crate::error::{HttpError, HttpResult};
use crate::http::{build_client, cancellable};

struct TransferControl {
    generation: u64,
    paused: watch::Sender<bool>,
    /// Fires on supersede or cancel.
    stop: CancellationToken,
    /// Serializes writers of the `.part` file.
    file_lock: Arc<AsyncMutex<()>>,
}

enum Fetch {
    Complete,
    Paused,
}

/// [`DownloadTransport`] over HTTP with resumable `.part` files.
pub struct HttpDownloadTransport {
    client: reqwest::Client,
    config: HttpClientConfig,
    cache_dir: PathBuf,
    cancel: Mutex<CancellationToken>,
    transfers: Mutex<HashMap<String, TransferControl>>,
    generations: AtomicU64,
}

impl HttpDownloadTransport {
    /// Create a transport writing into `cache_dir`, creating it if needed.
    pub fn new(config: &HttpClientConfig, cache_dir: impl Into<PathBuf>) -> HttpResult<Self> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            client: build_client(config)?,
            config: config.clone(),
            cache_dir,
            cancel: Mutex::new(CancellationToken::new()),
            transfers: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
        })
    }

    /// Local file the image at `path` is written to.
    pub fn location(&self, path: &str) -> PathBuf {
        let digest = Sha256::digest(path.as_bytes());
        self.cache_dir.join(format!("{digest:x}.img"))
    }

    fn partial_location(&self, path: &str) -> PathBuf {
        self.location(path).with_extension("img.part")
    }

    fn transfers(&self) -> std::sync::MutexGuard<'_, HashMap<String, TransferControl>> {
        self.transfers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Controls of the transfer registered under `transfer`, unless it was
    /// cancelled or superseded since.
    fn registration(
        &self,
        path: &str,
        transfer: TransferId,
    ) -> Option<(watch::Receiver<bool>, CancellationToken, Arc<AsyncMutex<()>>)> {
        self.transfers()
            .get(path)
            .filter(|control| control.generation == transfer.0 && !control.stop.is_cancelled())
            .map(|control| {
                (
                    control.paused.subscribe(),
                    control.stop.clone(),
                    Arc::clone(&control.file_lock),
                )
            })
    }

    fn unregister(&self, path: &str, generation: u64) {
        let mut transfers = self.transfers();
        if transfers
            .get(path)
            .is_some_and(|control| control.generation == generation)
        {
            transfers.remove(path);
        }
    }

    async fn transfer(
        &self,
        url: &Url,
        partial: &Path,
        destination: &Path,
        paused: &mut watch::Receiver<bool>,
        stop: &CancellationToken,
    ) -> Result<PathBuf, TransportError> {
        let attempts = self.config.max_attempts();
        let mut failures = 0;
        loop {
            wait_while_paused(paused, stop).await?;
            if is_complete(destination).await {
                return Ok(destination.to_path_buf());
            }

            match self.fetch_into(url, partial, paused, stop).await {
                Ok(Fetch::Complete) => {
                    tokio::fs::rename(partial, destination)
                        .await
                        .map_err(HttpError::from)?;
                    return Ok(destination.to_path_buf());
                }
                Ok(Fetch::Paused) => {
                    tracing::debug!(target: "ocm.http", url = %url, "Transfer paused");
                }
                Err(e) if e.is_transient() => {
                    failures += 1;
                    if failures >= attempts {
                        tracing::warn!(target: "ocm.http", url = %url, attempts, error = %e, "Giving up on image");
                        return Err(TransportError::RetryLimitExceeded { attempts });
                    }
                    let delay = self.config.backoff(failures);
                    tracing::debug!(target: "ocm.http", url = %url, failures, error = %e, "Retrying transfer");
                    cancellable(stop, async {
                        tokio::time::sleep(delay).await;
                        Ok(())
                    })
                    .await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One request, continuing `partial` when it already holds bytes.
    async fn fetch_into(
        &self,
        url: &Url,
        partial: &Path,
        paused: &mut watch::Receiver<bool>,
        stop: &CancellationToken,
    ) -> HttpResult<Fetch> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let offset = tokio::fs::metadata(partial)
            .await
            .map_or(0, |meta| meta.len());

        let mut request = self.client.get(url.as_str());
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }
        let mut response = cancellable(stop, async { Ok(request.send().await?) }).await?;

        let append = match response.status() {
            StatusCode::PARTIAL_CONTENT => true,
            // The partial file already holds the whole image.
            StatusCode::RANGE_NOT_SATISFIABLE if offset > 0 => return Ok(Fetch::Complete),
            status if status.is_success() => false,
            status => {
                return Err(HttpError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
        };

        let mut options = tokio::fs::OpenOptions::new();
        if append {
            options.append(true);
        } else {
            options.write(true).create(true).truncate(true);
        }
        let mut file = options.open(partial).await?;

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => return Err(HttpError::Cancelled),
                changed = paused.changed() => {
                    if changed.is_ok() && *paused.borrow() {
                        file.flush().await?;
                        return Ok(Fetch::Paused);
                    }
                }
                chunk = response.chunk() => match chunk? {
                    Some(bytes) => file.write_all(&bytes).await?,
                    None => {
                        file.flush().await?;
                        return Ok(Fetch::Complete);
                    }
                },
            }
        }
    }
}

async fn wait_while_paused(
    paused: &mut watch::Receiver<bool>,
    stop: &CancellationToken,
) -> HttpResult<()> {
    while *paused.borrow_and_update() {
        tokio::select! {
            biased;
            () = stop.cancelled() => return Err(HttpError::Cancelled),
            changed = paused.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

async fn is_complete(destination: &Path) -> bool {
    tokio::fs::metadata(destination)
        .await
        .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
}

#[async_trait]
impl DownloadTransport for HttpDownloadTransport {
    fn begin_download(&self, path: &str) -> TransferId {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let stop = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token();
        let (paused, _) = watch::channel(false);

        let mut transfers = self.transfers();
        let file_lock = match transfers.get(path) {
            Some(previous) => {
                tracing::debug!(target: "ocm.http", path, "Superseding earlier transfer");
                previous.stop.cancel();
                Arc::clone(&previous.file_lock)
            }
            None => Arc::default(),
        };
        transfers.insert(
            path.to_string(),
            TransferControl {
                generation,
                paused,
                stop,
                file_lock,
            },
        );
        TransferId(generation)
    }

    async fn download(&self, path: &str, transfer: TransferId) -> Result<PathBuf, TransportError> {
        let Some((mut paused, stop, file_lock)) = self.registration(path, transfer) else {
            tracing::debug!(target: "ocm.http", path, "Transfer cancelled before it started");
            return Err(TransportError::Cancelled);
        };

        let result = async {
            let url = Url::parse(path).map_err(|e| HttpError::invalid_url(path, e))?;
            let destination = self.location(path);
            if is_complete(&destination).await {
                return Ok(destination);
            }
            let _writer = file_lock.lock().await;
            self.transfer(&url, &self.partial_location(path), &destination, &mut paused, &stop)
                .await
        }
        .await;
        self.unregister(path, transfer.0);

        match &result {
            Ok(location) => {
                tracing::info!(target: "ocm.http", path, location = %location.display(), "Image transferred");
            }
            Err(TransportError::Cancelled) => {
                tracing::debug!(target: "ocm.http", path, "Transfer cancelled");
            }
            Err(e) => tracing::warn!(target: "ocm.http", path, error = %e, "Transfer failed"),
        }
        result
    }

    fn pause_download(&self, path: &str) {
        if let Some(control) = self.transfers().get(path) {
            control.paused.send_replace(true);
        }
    }

    fn cancel_download(&self, path: &str) {
        if let Some(control) = self.transfers().remove(path) {
            control.stop.cancel();
            tracing::debug!(target: "ocm.http", path, "Cancelled image transfer");
        }
    }

    fn resume_downloads(&self) {
        for control in self.transfers().values() {
            control.paused.send_replace(false);
        }
    }

    fn cancel_downloads(&self) {
        let previous = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            CancellationToken::new(),
        );
        previous.cancel();
        self.transfers().clear();
        tracing::info!(target: "ocm.http", "Cancelled image transfers");
    }
}
