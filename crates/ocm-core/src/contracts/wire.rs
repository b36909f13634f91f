//! Serde shapes of the remote documents and their mapping to domain types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ParsedContentList, ParsedMenus};
use crate::domain::{Content, ContentList, Media, Menu, ScheduleWindow, Section};
use crate::errors::ContentError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MenusDocument {
    menus: Vec<MenuJson>,
    #[serde(default)]
    elements_cache: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct MenuJson {
    slug: String,
    #[serde(default)]
    elements: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SectionJson {
    slug: Option<String>,
    element_url: Option<String>,
    section_view: Option<SectionViewJson>,
    custom_properties: Option<Map<String, Value>>,
    content_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionViewJson {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentListDocument {
    content: Option<ContentJson>,
    #[serde(default)]
    elements_cache: Map<String, Value>,
    expire_at: Option<DateTime<Utc>>,
    content_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentJson {
    layout: Option<Value>,
    elements: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ElementJson {
    id: Option<String>,
    slug: String,
    element_url: String,
    name: Option<String>,
    section_view: Option<MediaJson>,
    #[serde(default)]
    tags: Vec<String>,
    required_auth: Option<String>,
    custom_properties: Option<Map<String, Value>>,
    #[serde(default)]
    dates: Vec<DateJson>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaJson {
    image_url: Option<String>,
    thumbnail: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DateJson {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

pub(super) fn parse_menus(json: &Value) -> Result<ParsedMenus, ContentError> {
    let document = MenusDocument::deserialize(json)
        .map_err(|e| ContentError::parsing(format!("menus: {e}")))?;

    let menus = document
        .menus
        .into_iter()
        .map(|menu| Menu {
            sections: menu.elements.iter().filter_map(parse_section).collect(),
            slug: menu.slug,
        })
        .collect();

    Ok(ParsedMenus {
        menus,
        actions: document.elements_cache,
    })
}

fn parse_section(json: &Value) -> Option<Section> {
    let section = match SectionJson::deserialize(json) {
        Ok(section) => section,
        Err(e) => {
            tracing::warn!(target: "ocm.sync", error = %e, "Skipping malformed section");
            return None;
        }
    };

    let (Some(name), Some(slug), Some(element_url)) = (
        section.section_view.and_then(|view| view.text),
        section.slug,
        section.element_url,
    ) else {
        tracing::debug!(target: "ocm.sync", "Skipping section without name, slug or element url");
        return None;
    };

    Some(Section {
        name,
        slug,
        element_url,
        custom_properties: section.custom_properties,
        content_version: section.content_version,
    })
}

pub(super) fn parse_content_list(
    json: &Value,
    path: &str,
    page: u32,
) -> Result<ParsedContentList, ContentError> {
    let document = ContentListDocument::deserialize(json)
        .map_err(|e| ContentError::parsing(format!("content list {path}: {e}")))?;

    let content = document
        .content
        .ok_or_else(|| ContentError::parsing(format!("content list {path}: missing content")))?;
    let elements = content.elements.ok_or_else(|| {
        ContentError::parsing(format!("content list {path}: missing content elements"))
    })?;

    let contents = elements
        .iter()
        .filter_map(|element| parse_element(element, &document.elements_cache))
        .collect();

    Ok(ParsedContentList {
        list: ContentList {
            path: path.to_string(),
            page,
            contents,
            layout: content.layout,
            content_version: document.content_version,
            expiration_date: document.expire_at,
        },
        actions: document.elements_cache,
    })
}

fn parse_element(json: &Value, actions: &Map<String, Value>) -> Option<Content> {
    let element = match ElementJson::deserialize(json) {
        Ok(element) => element,
        Err(e) => {
            tracing::warn!(target: "ocm.sync", error = %e, "Skipping malformed content element");
            return None;
        }
    };

    let media = element.section_view.unwrap_or_default();
    let action_reference = actions
        .contains_key(&element.element_url)
        .then(|| element.element_url.clone());

    Some(Content {
        id: element.id.unwrap_or_else(|| element.slug.clone()),
        slug: element.slug,
        element_url: element.element_url,
        name: element.name,
        media: Media {
            image_url: media.image_url,
            thumbnail: media.thumbnail,
            text: media.text,
        },
        tags: element.tags.into_iter().collect::<BTreeSet<_>>(),
        required_auth_level: element.required_auth,
        custom_properties: element.custom_properties,
        schedule_windows: element
            .dates
            .into_iter()
            .map(|date| ScheduleWindow::new(date.start, date.end))
            .collect(),
        action_reference,
    })
}
