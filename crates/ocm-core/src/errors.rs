//! Error taxonomy of the sync engine.
//!
//! These errors travel through completion fan-out: one result is cloned to
//! every waiter of a coalesced request. They are therefore `Clone` and only
//! carry strings, never foreign error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::RepositoryError;

/// Errors surfaced by content, menu and action loads.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ContentError {
    /// The requested entity is not in the local store.
    #[error("Not in cache")]
    NotInCache,

    /// The cache layer was used before being initialized.
    #[error("Cache not initialized")]
    CacheNotInitialized,

    /// A payload could not be parsed.
    #[error("Parsing error: {message}")]
    Parsing {
        /// What could not be parsed.
        message: String,
    },

    /// The remote service failed.
    #[error("Network error: {message}")]
    Network {
        /// Underlying error description.
        message: String,
        /// HTTP status code if available.
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },

    /// The request was cancelled by `cancel_all_requests`.
    #[error("Request cancelled")]
    Cancelled,

    /// The local store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Underlying error description.
        message: String,
    },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ContentError {
    pub fn parsing(message: impl Into<String>) -> Self {
        Self::Parsing {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Check if this error represents an explicit cancellation.
    ///
    /// UI layers use this to suppress error messaging.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if retrying the same request later may succeed.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::NotInCache)
    }

    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInCache => "This content is not available offline.".to_string(),
            Self::CacheNotInitialized => "The offline cache is not ready yet.".to_string(),
            Self::Parsing { .. } => "The server sent content we could not read.".to_string(),
            Self::Network {
                status_code: Some(code),
                ..
            } => format!("Server error (HTTP {code}). Please try again later."),
            Self::Network { .. } => {
                "Network error. Please check your connection and try again.".to_string()
            }
            Self::Cancelled => "Request was cancelled.".to_string(),
            Self::Storage { message } => format!("Local storage error: {message}"),
            Self::Unknown { message } => message.clone(),
        }
    }
}

impl From<RepositoryError> for ContentError {
    fn from(err: RepositoryError) -> Self {
        Self::storage(err.to_string())
    }
}

/// Errors delivered to image completion handlers.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageCacheError {
    #[error("Invalid URL")]
    InvalidUrl,

    /// The transport gave up after its retry budget.
    #[error("Unable to download expected image after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    /// The transfer finished but left no usable file behind.
    #[error("Caching failed")]
    CachingFailed,

    /// `cancel_caching` was called while the image was queued or downloading.
    #[error("Caching cancelled")]
    CachingCancelled,

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl ImageCacheError {
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::CachingCancelled)
    }
}

/// Errors reported by a `DownloadTransport`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("Retry limit exceeded after {attempts} attempts")]
    RetryLimitExceeded { attempts: u32 },

    #[error("Transfer failed: {message}")]
    Failed { message: String },

    #[error("Transfer cancelled")]
    Cancelled,
}

impl From<TransportError> for ImageCacheError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidUrl { .. } => Self::InvalidUrl,
            TransportError::RetryLimitExceeded { attempts } => Self::RetryLimitExceeded { attempts },
            TransportError::Failed { message } => Self::DownloadFailed { message },
            TransportError::Cancelled => Self::CachingCancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_distinguished() {
        assert!(ContentError::Cancelled.is_cancelled());
        assert!(!ContentError::network("boom").is_cancelled());
        assert!(ImageCacheError::CachingCancelled.is_cancelled());
    }

    #[test]
    fn test_network_user_message_mentions_status() {
        let err = ContentError::network_with_status("bad gateway", 502);
        assert!(err.user_message().contains("502"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_repository_error_maps_to_storage() {
        let err: ContentError = RepositoryError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ContentError::Storage { ref message } if message.contains("disk full")));
    }

    #[test]
    fn test_transport_error_translation() {
        assert_eq!(
            ImageCacheError::from(TransportError::InvalidUrl {
                url: "x".to_string()
            }),
            ImageCacheError::InvalidUrl
        );
        let retry = ImageCacheError::from(TransportError::RetryLimitExceeded { attempts: 3 });
        assert_eq!(
            retry.to_string(),
            "Unable to download expected image after 3 attempts"
        );
        assert!(matches!(
            ImageCacheError::from(TransportError::Failed {
                message: "reset".to_string()
            }),
            ImageCacheError::DownloadFailed { .. }
        ));
        assert_eq!(
            ImageCacheError::from(TransportError::Cancelled),
            ImageCacheError::CachingCancelled
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = ContentError::network_with_status("timeout", 504);
        let json = serde_json::to_string(&err).unwrap();
        let back: ContentError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
