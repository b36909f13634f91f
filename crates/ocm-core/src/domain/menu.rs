//! Navigation structure: menus and their sections.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named grouping of sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub slug: String,
    pub sections: Vec<Section>,
}

/// An entry of a menu, pointing at the action that opens its content list.
///
/// Two sections are equal when their `(name, slug, element_url)` triple is
/// equal; custom properties and content version do not take part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub slug: String,
    pub element_url: String,
    pub custom_properties: Option<Map<String, Value>>,
    pub content_version: Option<String>,
}

impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.slug == other.slug && self.element_url == other.element_url
    }
}

impl Eq for Section {}

impl Hash for Section {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.slug.hash(state);
        self.element_url.hash(state);
    }
}

/// Result of a menu load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuLoad {
    pub menus: Vec<Menu>,
    /// `true` when the menus were read from the local store.
    pub from_cache: bool,
}
