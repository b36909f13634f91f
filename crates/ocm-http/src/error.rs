//! Internal error types of the HTTP adapters.
//!
//! These errors are mapped to the core port errors at the boundary.

use thiserror::Error;

use ocm_core::{ContentError, TransportError};

/// Result type alias for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Error)]
pub enum HttpError {
    /// The server answered with a non-success status.
    #[error("Request failed with status {status}: {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The URL that was requested
        url: String,
    },

    /// Network or HTTP client error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Writing the downloaded bytes failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request cancelled")]
    Cancelled,
}

impl HttpError {
    pub(crate) fn invalid_url(url: &str, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }

    /// Whether another attempt may succeed.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status >= 500,
            Self::Network(e) => !e.is_builder() && !e.is_decode(),
            Self::Io(_) => true,
            Self::InvalidUrl { .. } | Self::JsonParse(_) | Self::Cancelled => false,
        }
    }
}

impl From<HttpError> for ContentError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Status { status, url } => {
                Self::network_with_status(format!("{url} answered {status}"), status)
            }
            HttpError::Network(e) => match e.status() {
                Some(status) => Self::network_with_status(e.to_string(), status.as_u16()),
                None => Self::network(e.to_string()),
            },
            HttpError::JsonParse(e) => Self::parsing(e.to_string()),
            HttpError::Cancelled => Self::Cancelled,
            e @ HttpError::InvalidUrl { .. } => Self::network(e.to_string()),
            HttpError::Io(e) => Self::unknown(e.to_string()),
        }
    }
}

impl From<HttpError> for TransportError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Cancelled => Self::Cancelled,
            HttpError::InvalidUrl { url, .. } => Self::InvalidUrl { url },
            other => Self::Failed {
                message: other.to_string(),
            },
        }
    }
}
