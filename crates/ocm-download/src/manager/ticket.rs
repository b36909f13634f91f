//! Handle to a pending image request.

use std::path::PathBuf;

use tokio::sync::oneshot;

use ocm_core::ImageCacheError;

/// Resolves to the outcome of one `request_image` call.
#[derive(Debug)]
pub struct ImageTicket {
    inner: TicketState,
}

#[derive(Debug)]
enum TicketState {
    Ready(Result<PathBuf, ImageCacheError>),
    Pending(oneshot::Receiver<Result<PathBuf, ImageCacheError>>),
}

impl ImageTicket {
    pub(crate) const fn ready(outcome: Result<PathBuf, ImageCacheError>) -> Self {
        Self {
            inner: TicketState::Ready(outcome),
        }
    }

    pub(crate) const fn pending(rx: oneshot::Receiver<Result<PathBuf, ImageCacheError>>) -> Self {
        Self {
            inner: TicketState::Pending(rx),
        }
    }

    /// Whether the outcome was known when the ticket was issued.
    pub const fn is_ready(&self) -> bool {
        matches!(self.inner, TicketState::Ready(_))
    }

    /// Wait for the image.
    pub async fn wait(self) -> Result<PathBuf, ImageCacheError> {
        match self.inner {
            TicketState::Ready(outcome) => outcome,
            TicketState::Pending(rx) => rx.await.unwrap_or_else(|_| {
                Err(ImageCacheError::Unknown {
                    message: "image scheduler dropped the request".to_string(),
                })
            }),
        }
    }
}
