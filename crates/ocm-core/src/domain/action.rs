//! Actions: what happens when a content item or section is opened.
//!
//! Actions arrive as JSON objects tagged with a `type` field. The tag is
//! looked up in [`ACTION_PARSERS`]; each parser validates the `render`
//! payload for its variant. Unknown tags and malformed payloads produce no
//! action rather than an error, so a single bad entry never poisons a whole
//! response.

use serde_json::{Map, Value};
use url::Url;

/// Preview shown before an action's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub image_url: Option<String>,
    pub text: Option<String>,
}

/// Sharing metadata attached to an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareInfo {
    pub url: Option<String>,
    pub text: Option<String>,
}

/// Variant-specific part of an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Open `url` in the system browser.
    Browser { url: Url, federated: bool },
    /// Open `url` in an embedded web view.
    Webview { url: Url, federated: bool },
    /// A set of cards rendered natively.
    Card { cards: Vec<Value> },
    /// Detail screen of a coupon.
    CouponDetail { coupon_id: String },
    /// A content list reachable under `content_url`.
    ContentList { content_url: String },
    /// Native article; the render payload is interpreted by the host.
    Article { render: Value },
    Video { source: String, format: Option<String> },
    DeepLink { uri: String },
}

impl ActionKind {
    /// The type tag this variant is parsed from.
    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::Browser { .. } => "browser",
            Self::Webview { .. } => "webview",
            Self::Card { .. } => "cards",
            Self::CouponDetail { .. } => "coupon",
            Self::ContentList { .. } => "content",
            Self::Article { .. } => "article",
            Self::Video { .. } => "video",
            Self::DeepLink { .. } => "deepLink",
        }
    }
}

/// A parsed action.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// Element url or slug the action was requested with.
    pub identifier: String,
    pub kind: ActionKind,
    pub preview: Option<Preview>,
    pub share_info: Option<ShareInfo>,
    /// Raw `render` object, kept for the host UI.
    pub render: Option<Value>,
}

type ActionParser = fn(Option<&Map<String, Value>>) -> Option<ActionKind>;

/// Dispatch table from `type` tag to variant parser.
pub const ACTION_PARSERS: &[(&str, ActionParser)] = &[
    ("browser", parse_browser),
    ("webview", parse_webview),
    ("cards", parse_cards),
    ("coupon", parse_coupon),
    ("content", parse_content_list),
    ("article", parse_article),
    ("video", parse_video),
    ("deepLink", parse_deep_link),
];

impl Action {
    /// Parse an action from its JSON payload.
    ///
    /// Returns `None` for unknown type tags or payloads missing fields
    /// required by their variant.
    pub fn from_json(identifier: &str, json: &Value) -> Option<Self> {
        let object = json.as_object()?;
        let tag = object.get("type")?.as_str()?;
        let render = object.get("render").and_then(Value::as_object);

        let parser = ACTION_PARSERS
            .iter()
            .find(|(candidate, _)| *candidate == tag)
            .map(|(_, parser)| *parser)?;
        let kind = parser(render)?;

        Some(Self {
            identifier: identifier.to_string(),
            kind,
            preview: object.get("preview").and_then(parse_preview),
            share_info: object.get("share").and_then(parse_share),
            render: object.get("render").cloned(),
        })
    }

    /// Path of the content list this action opens, if any.
    pub fn content_path(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::ContentList { content_url } => Some(content_url),
            _ => None,
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_web_target(render: Option<&Map<String, Value>>) -> Option<(Url, bool)> {
    let render = render?;
    let url = Url::parse(render.get("url")?.as_str()?).ok()?;
    let federated = render
        .get("federatedAuth")
        .and_then(|auth| auth.get("active"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some((url, federated))
}

fn parse_browser(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    parse_web_target(render).map(|(url, federated)| ActionKind::Browser { url, federated })
}

fn parse_webview(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    parse_web_target(render).map(|(url, federated)| ActionKind::Webview { url, federated })
}

fn parse_cards(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    let cards = render?.get("elements")?.as_array()?.clone();
    Some(ActionKind::Card { cards })
}

fn parse_coupon(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    let render = render?;
    // Coupon ids are sent either as strings or as bare numbers.
    let coupon_id = match render.get("idCoupon")? {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    Some(ActionKind::CouponDetail { coupon_id })
}

fn parse_content_list(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    string_field(render?, "contentUrl").map(|content_url| ActionKind::ContentList { content_url })
}

fn parse_article(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    Some(ActionKind::Article {
        render: Value::Object(render?.clone()),
    })
}

fn parse_video(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    let render = render?;
    Some(ActionKind::Video {
        source: string_field(render, "source")?,
        format: string_field(render, "format"),
    })
}

fn parse_deep_link(render: Option<&Map<String, Value>>) -> Option<ActionKind> {
    string_field(render?, "uri").map(|uri| ActionKind::DeepLink { uri })
}

fn parse_preview(json: &Value) -> Option<Preview> {
    let object = json.as_object()?;
    Some(Preview {
        image_url: string_field(object, "imageUrl"),
        text: string_field(object, "text"),
    })
}

fn parse_share(json: &Value) -> Option<ShareInfo> {
    let object = json.as_object()?;
    Some(ShareInfo {
        url: string_field(object, "url"),
        text: string_field(object, "text"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_browser_action() {
        let action = Action::from_json(
            "/element/web",
            &json!({
                "type": "browser",
                "render": { "url": "https://example.com", "federatedAuth": { "active": true } },
                "share": { "url": "https://example.com/share" }
            }),
        )
        .unwrap();

        assert_eq!(action.identifier, "/element/web");
        assert!(matches!(
            action.kind,
            ActionKind::Browser { federated: true, .. }
        ));
        assert_eq!(
            action.share_info.unwrap().url.as_deref(),
            Some("https://example.com/share")
        );
    }

    #[test]
    fn test_webview_with_invalid_url_is_rejected() {
        let json = json!({ "type": "webview", "render": { "url": "not a url" } });
        assert!(Action::from_json("/element/web", &json).is_none());
    }

    #[test]
    fn test_content_action_exposes_path() {
        let json = json!({ "type": "content", "render": { "contentUrl": "/content/home" } });
        let action = Action::from_json("/element/home", &json).unwrap();
        assert_eq!(action.content_path(), Some("/content/home"));
        assert_eq!(action.kind.type_tag(), "content");
    }

    #[test]
    fn test_coupon_accepts_numeric_id() {
        let json = json!({ "type": "coupon", "render": { "idCoupon": 42 } });
        let action = Action::from_json("/element/coupon", &json).unwrap();
        assert_eq!(
            action.kind,
            ActionKind::CouponDetail {
                coupon_id: "42".to_string()
            }
        );
    }

    #[test]
    fn test_cards_keep_nested_elements() {
        let json = json!({ "type": "cards", "render": { "elements": [{ "type": "image" }, { "type": "text" }] } });
        let action = Action::from_json("/element/cards", &json).unwrap();
        assert!(matches!(action.kind, ActionKind::Card { ref cards } if cards.len() == 2));
    }

    #[test]
    fn test_unknown_type_yields_none() {
        let json = json!({ "type": "hologram", "render": {} });
        assert!(Action::from_json("/element/x", &json).is_none());
    }

    #[test]
    fn test_every_tag_in_table_roundtrips_through_type_tag() {
        let samples = [
            json!({ "type": "browser", "render": { "url": "https://a.b" } }),
            json!({ "type": "webview", "render": { "url": "https://a.b" } }),
            json!({ "type": "cards", "render": { "elements": [] } }),
            json!({ "type": "coupon", "render": { "idCoupon": "c1" } }),
            json!({ "type": "content", "render": { "contentUrl": "/content/x" } }),
            json!({ "type": "article", "render": { "elements": [] } }),
            json!({ "type": "video", "render": { "source": "abc", "format": "youtube" } }),
            json!({ "type": "deepLink", "render": { "uri": "app://home" } }),
        ];
        for sample in samples {
            let tag = sample["type"].as_str().unwrap().to_string();
            let action = Action::from_json("id", &sample).unwrap();
            assert_eq!(action.kind.type_tag(), tag);
        }
        assert_eq!(ACTION_PARSERS.len(), 8);
    }
}
