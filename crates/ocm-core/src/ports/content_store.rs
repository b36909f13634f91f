//! Persistent content store port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepositoryError;
use crate::contracts::{RawAction, RawContentList};
use crate::domain::{Action, ContentList, Menu, Section};

/// Persists menus, sections, actions and paginated content lists.
///
/// Implementations must sequence writes to the same path: two concurrent
/// saves of one content list may not interleave.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Replace the persisted menu set: menus absent from `menus` are
    /// deleted, the others are inserted or updated in order.
    async fn save_menus(&self, menus: &[Menu]) -> Result<(), RepositoryError>;

    /// Replace the sections of `menu_slug`, keeping their order.
    async fn save_sections(&self, sections: &[Section], menu_slug: &str)
    -> Result<(), RepositoryError>;

    /// Persist the action opened by `section`.
    async fn save_action_in_section(
        &self,
        action: &RawAction,
        section: &Section,
    ) -> Result<(), RepositoryError>;

    /// Replace the content list stored under `path` with `payload`.
    async fn save_content(
        &self,
        payload: &RawContentList,
        path: &str,
        expiration_date: Option<DateTime<Utc>>,
        content_version: Option<&str>,
    ) -> Result<(), RepositoryError>;

    /// Append the elements of a later page to the list under `path`.
    async fn append_content(
        &self,
        payload: &RawContentList,
        path: &str,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError>;

    /// Persist an action by its identifier, optionally linked to the content
    /// list that delivered it.
    async fn save_action(
        &self,
        action: &RawAction,
        content_path: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn load_menus(&self) -> Result<Vec<Menu>, RepositoryError>;

    async fn load_action(&self, identifier: &str) -> Result<Option<Action>, RepositoryError>;

    /// Load page `page` of the list under `path`, keeping only content
    /// visible at `valid_at`.
    ///
    /// A page holds `items` elements (`0` means the whole list). Returns
    /// `None` when nothing is stored for the path, or when a later page has
    /// no stored elements.
    async fn load_content_list(
        &self,
        path: &str,
        valid_at: DateTime<Utc>,
        page: u32,
        items: u32,
    ) -> Result<Option<ContentList>, RepositoryError>;

    async fn load_content_version(&self, path: &str) -> Result<Option<String>, RepositoryError>;

    /// The section whose action opens the content list under `path`.
    async fn load_section_for_content(&self, path: &str)
    -> Result<Option<Section>, RepositoryError>;

    /// The section whose element url is `identifier`.
    async fn load_section_for_action(
        &self,
        identifier: &str,
    ) -> Result<Option<Section>, RepositoryError>;

    /// Delete everything.
    async fn clean_database(&self) -> Result<(), RepositoryError>;
}
