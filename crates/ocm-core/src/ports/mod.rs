//! Port definitions (trait abstractions) for external collaborators.
//!
//! The sync coordinator and the download scheduler only talk to the outside
//! world through these traits. Concrete implementations live in adapter
//! crates (`ocm-db`, `ocm-http`, `ocm-download`).
//!
//! # Design Rules
//!
//! - No adapter-specific types in signatures (no `sqlx`, no `reqwest`)
//! - All traits require `Send + Sync` so they can be shared as `Arc<dyn Port>`
//! - Errors crossing a port are the core error enums

mod content_cache;
mod content_store;
mod download_transport;
mod reachability;
mod remote_content;

use thiserror::Error;

pub use content_cache::{ContentCachePort, NoopContentCache};
pub use content_store::ContentStore;
pub use download_transport::{DownloadTransport, TransferId};
pub use reachability::{ReachabilityMonitor, StaticReachability};
pub use remote_content::RemoteContentService;

/// Domain-specific errors for store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A persisted payload could not be serialized or read back.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
