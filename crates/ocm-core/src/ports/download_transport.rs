//! Image byte-transfer port.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::TransportError;

/// Handle of one registered transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferId(pub u64);

/// Performs single image transfers to local files.
///
/// The scheduler above enforces the concurrency limit; a transport runs
/// whatever it is asked to run.
///
/// A transfer is registered with [`begin_download`](Self::begin_download)
/// and then driven by [`download`](Self::download). Pause and cancel requests
/// apply from registration on, even before the `download` future first runs.
/// A cancelled or superseded transfer resolves to
/// [`TransportError::Cancelled`] without touching the network again.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    /// Register a transfer of `path`, superseding any earlier one.
    fn begin_download(&self, path: &str) -> TransferId;

    /// Run the transfer registered under `transfer` and return the local file
    /// it was written to.
    async fn download(&self, path: &str, transfer: TransferId) -> Result<PathBuf, TransportError>;

    fn pause_download(&self, path: &str);

    /// Cancel the transfer of `path`. Bytes already written may be reused by
    /// a later transfer of the same path.
    fn cancel_download(&self, path: &str);

    /// Resume every paused transfer.
    fn resume_downloads(&self);

    /// Cancel every registered transfer.
    fn cancel_downloads(&self);
}
