//! Content list and content item types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A time window during which a content item may be displayed.
///
/// Either bound may be open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ScheduleWindow {
    pub const fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Whether `at` falls inside this window (bounds inclusive).
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let after_start = self.start.is_none_or(|start| start <= at);
        let before_end = self.end.is_none_or(|end| at <= end);
        after_start && before_end
    }
}

/// Visual payload of a content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Remote image location; this is the key submitted to the image scheduler.
    pub image_url: Option<String>,
    pub thumbnail: Option<String>,
    pub text: Option<String>,
}

/// A single displayable item of a content list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub slug: String,
    pub element_url: String,
    pub name: Option<String>,
    pub media: Media,
    pub tags: BTreeSet<String>,
    pub required_auth_level: Option<String>,
    pub custom_properties: Option<Map<String, Value>>,
    pub schedule_windows: Vec<ScheduleWindow>,
    /// Identifier of the action opened by this content, when the payload
    /// that delivered it also carried the action.
    pub action_reference: Option<String>,
}

impl Content {
    /// A content item is visible when it has no schedule or when any of its
    /// windows contains `at`.
    pub fn is_visible_at(&self, at: DateTime<Utc>) -> bool {
        self.schedule_windows.is_empty() || self.schedule_windows.iter().any(|w| w.contains(at))
    }
}

/// One page of a paginated content collection under a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentList {
    pub path: String,
    pub page: u32,
    pub contents: Vec<Content>,
    pub layout: Option<Value>,
    pub content_version: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
}

impl ContentList {
    /// Number of content items in this page.
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// Whether the list expired before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date.is_some_and(|expiration| expiration < now)
    }

    /// Whether a cached copy of this page is too short to satisfy a request
    /// for `items` elements on `page`.
    ///
    /// Page 1 is never stale: whatever was cached is shown. `items == 0`
    /// requests the whole list and is never stale either.
    pub fn is_stale_for(&self, page: u32, items: u32) -> bool {
        if page <= 1 || items == 0 {
            return false;
        }
        self.contents.len() < items as usize
    }

    /// Drop every content item not visible at `at`.
    #[must_use]
    pub fn visible_at(mut self, at: DateTime<Utc>) -> Self {
        self.contents.retain(|content| content.is_visible_at(at));
        self
    }
}
