//! Document Data Model
//!
//! The stored documents that drive the application: routes, middlewares,
//! reusable components, and the view trees they carry. These are authored
//! externally, pulled as a versioned snapshot, and consumed verbatim by the
//! resolution pipeline on both sides of the wire.
//!
//! # Dual View Form
//!
//! `Route::view` and `Component::view` are `serde_json::Value` because the
//! same document exists in two forms: a plain `ViewDocument` object on the
//! wire, and a layered-cipher text string once the client has re-encrypted
//! it into its local cache.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::shared::error::{EngineError, EngineResult};

/// Reserved endpoint for the not-found fallback route.
pub const WILDCARD_ENDPOINT: &str = "*";

/// Which side of the wire a route or middleware belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Audience {
    /// Frontend document, shipped to clients in the init bundle
    #[default]
    FE,
    /// Backend document, matched and executed on the server
    BE,
}

impl Audience {
    /// Whether this is the frontend audience.
    ///
    /// Frontend documents omit the `for` field on the wire, matching the
    /// bundle shape clients expect.
    pub fn is_fe(&self) -> bool {
        matches!(self, Audience::FE)
    }
}

/// A declarative route: path pattern plus either a UI view or a server script
///
/// Uniqueness invariant: the (`for`, `endpoint`) pair is unique within a
/// document set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Path pattern, e.g. `/users/:id`; `*` is the reserved fallback
    pub endpoint: String,
    /// HTTP method filter, only meaningful for backend routes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Which side executes this route
    #[serde(rename = "for", default, skip_serializing_if = "Audience::is_fe")]
    pub audience: Audience,
    /// Keys of middlewares to run before this route, in declared order
    #[serde(default)]
    pub middlewares: Vec<String>,
    /// A `ViewDocument` object (frontend), a script string (backend), or
    /// cipher text once cached client-side
    pub view: Value,
}

impl Route {
    /// Whether this is the reserved not-found fallback.
    pub fn is_wildcard(&self) -> bool {
        self.endpoint == WILDCARD_ENDPOINT
    }

    /// Parse the view as a `ViewDocument` (wire form).
    pub fn view_document(&self) -> EngineResult<ViewDocument> {
        serde_json::from_value(self.view.clone())
            .map_err(|e| EngineError::serialization(format!("route view: {}", e)))
    }

    /// The view as cipher text (client cache form).
    pub fn view_cipher_text(&self) -> Option<&str> {
        self.view.as_str()
    }

    /// The view as a backend script body.
    pub fn script(&self) -> Option<&str> {
        self.view.as_str()
    }
}

/// A named script run before a route, with a deterministic position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Middleware {
    /// Unique key referenced from `Route::middlewares`
    pub key: String,
    /// Which side executes this middleware
    #[serde(rename = "for", default, skip_serializing_if = "Audience::is_fe")]
    pub audience: Audience,
    /// Script body (plain on the wire, cipher text once cached)
    pub script: String,
    /// Execution order among the middlewares attached to a matched route
    pub order: i64,
}

/// Select and order the middlewares a matched route asked for.
///
/// Keys the route names but the set does not contain are skipped; the
/// remainder run in ascending `order`.
pub fn middlewares_for_route<'a>(
    all: &'a [Middleware],
    keys: &[String],
) -> Vec<&'a Middleware> {
    let mut selected: Vec<&Middleware> = all
        .iter()
        .filter(|middleware| keys.contains(&middleware.key))
        .collect();
    selected.sort_by_key(|middleware| middleware.order);
    selected
}

/// A named, reusable view fragment referenced from other views by key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    /// Unique key referenced by component variables
    pub key: String,
    /// A `ViewDocument` object on the wire, cipher text once cached
    pub view: Value,
}

impl Component {
    /// Parse the view as a `ViewDocument` (wire form).
    pub fn view_document(&self) -> EngineResult<ViewDocument> {
        serde_json::from_value(self.view.clone())
            .map_err(|e| EngineError::serialization(format!("component view: {}", e)))
    }

    /// The view as cipher text (client cache form).
    pub fn view_cipher_text(&self) -> Option<&str> {
        self.view.as_str()
    }
}

/// A renderable view: element tree plus lifecycle scripts and local literals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewDocument {
    /// Document title committed when the view becomes active
    pub title: String,
    /// Inline stylesheet handed to the rendering collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Script run once after the render tree is committed
    #[serde(rename = "onLoad", default, skip_serializing_if = "Option::is_none")]
    pub on_load: Option<String>,
    /// Script run once when this view is about to be replaced
    #[serde(rename = "onClose", default, skip_serializing_if = "Option::is_none")]
    pub on_close: Option<String>,
    /// Root of the element tree
    pub render: ElementNode,
    /// Action-variable literals substituted into the serialized tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<BTreeMap<String, String>>,
}

/// One node of the serialized element tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    /// Tag name
    pub element: String,
    /// Attribute map; values are substrates for variable substitution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    /// Child nodes and text runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Child>>,
}

/// A child of an element: nested node or text run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Child {
    /// Plain text content
    Text(String),
    /// Nested element
    Node(ElementNode),
}

/// The full document set pulled from the init endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentBundle {
    /// Monotonically-advancing version marker for the whole set
    pub version: String,
    /// Middlewares, all audiences mixed on the server side
    #[serde(default)]
    pub middlewares: Vec<Middleware>,
    /// Routes, all audiences mixed on the server side
    #[serde(default)]
    pub routes: Vec<Route>,
    /// Reusable components
    #[serde(default)]
    pub components: Vec<Component>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_route_wire_round_trip() {
        let wire = json!({
            "endpoint": "/users/:id",
            "for": "BE",
            "method": "GET",
            "middlewares": ["auth"],
            "view": "[\"do\"]"
        });
        let route: Route = serde_json::from_value(wire).unwrap();
        assert_eq!(route.audience, Audience::BE);
        assert_eq!(route.method.as_deref(), Some("GET"));
        assert_eq!(route.script(), Some("[\"do\"]"));
    }

    #[test]
    fn test_route_audience_defaults_to_fe() {
        // Bundle routes arrive with the `for` field stripped.
        let wire = json!({
            "endpoint": "/",
            "middlewares": [],
            "view": {"title": "Home", "render": {"element": "div"}}
        });
        let route: Route = serde_json::from_value(wire).unwrap();
        assert_eq!(route.audience, Audience::FE);
        assert!(route.view_document().is_ok());
    }

    #[test]
    fn test_fe_route_serializes_without_for() {
        let route = Route {
            endpoint: "/".into(),
            method: None,
            audience: Audience::FE,
            middlewares: vec![],
            view: json!({"title": "t", "render": {"element": "div"}}),
        };
        let wire = serde_json::to_value(&route).unwrap();
        assert!(wire.get("for").is_none());
    }

    #[test]
    fn test_wildcard_detection() {
        let route = Route {
            endpoint: "*".into(),
            method: None,
            audience: Audience::FE,
            middlewares: vec![],
            view: json!({"title": "404", "render": {"element": "div"}}),
        };
        assert!(route.is_wildcard());
    }

    #[test]
    fn test_view_document_lifecycle_fields() {
        let view: ViewDocument = serde_json::from_value(json!({
            "title": "Hello",
            "onLoad": "[\"log\", \"loaded\"]",
            "onClose": "[\"log\", \"closed\"]",
            "render": {
                "element": "div",
                "children": ["text run", {"element": "span"}]
            },
            "action": {"greeting": "Hi"}
        }))
        .unwrap();
        assert_eq!(view.on_load.as_deref(), Some("[\"log\", \"loaded\"]"));
        let children = view.render.children.unwrap();
        assert_eq!(children[0], Child::Text("text run".into()));
        assert!(matches!(children[1], Child::Node(_)));
    }

    #[test]
    fn test_middleware_ordering() {
        let all = vec![
            Middleware {
                key: "b".into(),
                audience: Audience::FE,
                script: String::new(),
                order: 2,
            },
            Middleware {
                key: "a".into(),
                audience: Audience::FE,
                script: String::new(),
                order: 1,
            },
            Middleware {
                key: "unused".into(),
                audience: Audience::FE,
                script: String::new(),
                order: 0,
            },
        ];
        let selected = middlewares_for_route(&all, &["b".into(), "a".into()]);
        let keys: Vec<&str> = selected.iter().map(|m| m.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_bundle_round_trip() {
        let bundle = DocumentBundle {
            version: "1.0.0".into(),
            middlewares: vec![],
            routes: vec![],
            components: vec![],
        };
        let wire = serde_json::to_string(&bundle).unwrap();
        let back: DocumentBundle = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.version, "1.0.0");
    }
}
