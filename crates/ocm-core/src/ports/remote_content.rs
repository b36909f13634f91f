//! Remote content service port.

use async_trait::async_trait;

use crate::contracts::{RawAction, RawContentList, RawMenus};
use crate::errors::ContentError;

/// Network access to menus, content lists and actions.
///
/// Every call in flight when [`cancel_active_requests`] is invoked must
/// resolve to [`ContentError::Cancelled`].
///
/// [`cancel_active_requests`]: RemoteContentService::cancel_active_requests
#[async_trait]
pub trait RemoteContentService: Send + Sync {
    async fn get_menus(&self) -> Result<RawMenus, ContentError>;

    async fn get_content_list(
        &self,
        path: &str,
        page: u32,
        items: u32,
    ) -> Result<RawContentList, ContentError>;

    /// Full-text search over content.
    async fn search_content_list(&self, query: &str) -> Result<RawContentList, ContentError>;

    async fn get_element(&self, identifier: &str) -> Result<RawAction, ContentError>;

    /// Cancel every request currently in flight.
    fn cancel_active_requests(&self);
}
