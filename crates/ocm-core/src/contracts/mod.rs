//! Wire payloads exchanged with the remote content service.
//!
//! The remote service hands back raw JSON documents. They are kept raw until
//! the coordinator or the store needs typed data, because the store persists
//! payloads verbatim and parses them on its own schedule.

mod wire;

use serde_json::{Map, Value};

use crate::domain::{Action, ContentList, Menu};
use crate::errors::ContentError;

/// Raw menus document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMenus(pub Value);

/// Raw content list document (one page, or a search result).
#[derive(Debug, Clone, PartialEq)]
pub struct RawContentList(pub Value);

/// Raw action document together with the identifier it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAction {
    pub identifier: String,
    pub payload: Value,
}

/// Typed view of a menus document.
#[derive(Debug, Clone)]
pub struct ParsedMenus {
    pub menus: Vec<Menu>,
    /// Actions delivered alongside the menus, keyed by element url.
    pub actions: Map<String, Value>,
}

impl ParsedMenus {
    /// Action opened by the section with `element_url`, when delivered.
    pub fn action_for(&self, element_url: &str) -> Option<RawAction> {
        self.actions
            .get(element_url)
            .map(|payload| RawAction::new(element_url, payload.clone()))
    }

    /// The menu with the most sections. Its sections are the ones worth
    /// prefetching images for.
    pub fn largest_menu(&self) -> Option<&Menu> {
        self.menus.iter().max_by_key(|menu| menu.sections.len())
    }
}

/// Typed view of a content list document.
#[derive(Debug, Clone)]
pub struct ParsedContentList {
    pub list: ContentList,
    /// Actions delivered alongside the content, keyed by element url.
    pub actions: Map<String, Value>,
}

impl ParsedContentList {
    /// Every delivered action as a raw action.
    pub fn raw_actions(&self) -> impl Iterator<Item = RawAction> + '_ {
        self.actions
            .iter()
            .map(|(identifier, payload)| RawAction::new(identifier, payload.clone()))
    }
}

impl RawMenus {
    pub fn from_json_str(json: &str) -> Result<Self, ContentError> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| ContentError::parsing(e.to_string()))
    }

    pub fn parse(&self) -> Result<ParsedMenus, ContentError> {
        wire::parse_menus(&self.0)
    }
}

impl RawContentList {
    pub fn from_json_str(json: &str) -> Result<Self, ContentError> {
        serde_json::from_str(json)
            .map(Self)
            .map_err(|e| ContentError::parsing(e.to_string()))
    }

    /// Parse this document as page `page` of the list under `path`.
    pub fn parse(&self, path: &str, page: u32) -> Result<ParsedContentList, ContentError> {
        wire::parse_content_list(&self.0, path, page)
    }
}

impl RawAction {
    pub fn new(identifier: impl Into<String>, payload: Value) -> Self {
        Self {
            identifier: identifier.into(),
            payload,
        }
    }

    /// Parse into a typed action; `None` for unknown or malformed actions.
    pub fn parse(&self) -> Option<Action> {
        Action::from_json(&self.identifier, &self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn menus_document() -> Value {
        json!({
            "menus": [
                {
                    "slug": "main",
                    "elements": [
                        { "slug": "home", "elementUrl": "/element/home", "sectionView": { "text": "Home" } },
                        { "slug": "news", "elementUrl": "/element/news", "sectionView": { "text": "News" }, "contentVersion": "v2" }
                    ]
                },
                {
                    "slug": "footer",
                    "elements": [
                        { "slug": "about", "elementUrl": "/element/about", "sectionView": { "text": "About" } }
                    ]
                }
            ],
            "elementsCache": {
                "/element/home": { "type": "content", "render": { "contentUrl": "/content/home" } }
            }
        })
    }

    #[test]
    fn test_parse_menus() {
        let parsed = RawMenus(menus_document()).parse().unwrap();
        assert_eq!(parsed.menus.len(), 2);
        assert_eq!(parsed.menus[0].sections[1].content_version.as_deref(), Some("v2"));
        assert_eq!(parsed.largest_menu().unwrap().slug, "main");

        let action = parsed.action_for("/element/home").unwrap().parse().unwrap();
        assert_eq!(action.content_path(), Some("/content/home"));
        assert!(parsed.action_for("/element/news").is_none());
    }

    #[test]
    fn test_menus_document_without_menus_is_a_parse_error() {
        let err = RawMenus(json!({ "status": "ok" })).parse().unwrap_err();
        assert!(matches!(err, ContentError::Parsing { .. }));
    }

    #[test]
    fn test_parse_content_list() {
        let raw = RawContentList(json!({
            "content": {
                "slug": "home",
                "layout": { "type": "carousel" },
                "elements": [
                    {
                        "slug": "first",
                        "elementUrl": "/element/first",
                        "name": "First",
                        "sectionView": { "imageUrl": "https://cdn.example.com/first.png" },
                        "tags": ["a", "b"],
                        "dates": [{ "start": "2024-01-01T00:00:00Z", "end": "2024-12-31T23:59:59Z" }]
                    },
                    { "slug": "broken" }
                ]
            },
            "elementsCache": {
                "/element/first": { "type": "browser", "render": { "url": "https://example.com" } }
            },
            "expireAt": "2030-01-01T00:00:00Z",
            "contentVersion": "42"
        }));

        let parsed = raw.parse("/content/home", 1).unwrap();
        let list = &parsed.list;
        assert_eq!(list.path, "/content/home");
        assert_eq!(list.page, 1);
        assert_eq!(list.len(), 1);
        assert_eq!(list.content_version.as_deref(), Some("42"));
        assert!(list.expiration_date.is_some());
        assert!(list.layout.is_some());

        let first = &list.contents[0];
        assert_eq!(first.id, "first");
        assert_eq!(first.tags.len(), 2);
        assert_eq!(first.schedule_windows.len(), 1);
        assert_eq!(
            first.media.image_url.as_deref(),
            Some("https://cdn.example.com/first.png")
        );
        assert_eq!(first.action_reference.as_deref(), Some("/element/first"));
        assert_eq!(parsed.raw_actions().count(), 1);
    }

    #[test]
    fn test_content_list_without_elements_is_a_parse_error() {
        let err = RawContentList(json!({ "content": { "slug": "x" } }))
            .parse("/content/x", 1)
            .unwrap_err();
        assert!(matches!(err, ContentError::Parsing { .. }));
    }

    #[test]
    fn test_from_json_str_rejects_garbage() {
        assert!(RawContentList::from_json_str("{not json").is_err());
        assert!(RawMenus::from_json_str("{\"menus\":[]}").is_ok());
    }
}
