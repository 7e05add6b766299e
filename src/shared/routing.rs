//! Route Resolver
//!
//! Matches an incoming path against an ordered list of route patterns,
//! producing the matched document plus extracted named parameters, with a
//! reserved `*` wildcard as the not-found fallback.
//!
//! # Pattern Language
//!
//! A `:name` segment captures one or more non-slash characters; everything
//! else matches literally. Patterns and paths are normalized the same way
//! before matching: a leading slash is enforced and a single trailing slash
//! is stripped (except for the root `/`), so `/x` and `/x/` are identical.
//!
//! # Matching Order
//!
//! Patterns are tested in document order and the first structural match
//! wins. There is no specificity scoring; the document author is
//! responsible for ordering specific patterns before general ones. The
//! wildcard is never pattern-tested, only consulted after the whole list
//! yields nothing.

use regex::Regex;
use std::collections::BTreeMap;

use crate::shared::document::Route;

/// A route selected for a request, with its extracted path parameters
///
/// Ephemeral: derived per navigation and never persisted.
#[derive(Debug, Clone)]
pub struct MatchedRoute {
    /// The matched route document
    pub route: Route,
    /// Named parameters extracted from the path
    pub params: BTreeMap<String, String>,
}

/// One route with its compiled pattern
struct CompiledRoute {
    route: Route,
    pattern: Option<(Regex, Vec<String>)>,
}

/// An ordered route list with patterns compiled once
pub struct RouteTable {
    entries: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Build a table from routes in document order.
    ///
    /// The wildcard entry is kept but never compiled. A pattern that fails
    /// to compile is logged and skipped rather than poisoning the table.
    pub fn new(routes: Vec<Route>) -> Self {
        let entries = routes
            .into_iter()
            .map(|route| {
                let pattern = if route.is_wildcard() {
                    None
                } else {
                    match compile_pattern(&route.endpoint) {
                        Ok(compiled) => Some(compiled),
                        Err(message) => {
                            tracing::warn!(
                                endpoint = %route.endpoint,
                                "skipping route with invalid pattern: {}",
                                message
                            );
                            None
                        }
                    }
                };
                CompiledRoute { route, pattern }
            })
            .collect();
        Self { entries }
    }

    /// Match a path, falling back to the wildcard route if present.
    pub fn match_path(&self, path: &str) -> Option<MatchedRoute> {
        self.scan(path, None)
    }

    /// Match a path with the server-side method filter applied.
    ///
    /// A route declaring a method only matches that method; a route without
    /// one accepts any. The wildcard fallback is not method-filtered.
    pub fn match_request(&self, method: &str, path: &str) -> Option<MatchedRoute> {
        self.scan(path, Some(method))
    }

    fn scan(&self, path: &str, method: Option<&str>) -> Option<MatchedRoute> {
        let normalized = normalize_path(path);
        for entry in &self.entries {
            let Some((regex, names)) = &entry.pattern else {
                continue;
            };
            if let (Some(requested), Some(declared)) = (method, entry.route.method.as_deref()) {
                if !declared.eq_ignore_ascii_case(requested) {
                    continue;
                }
            }
            if let Some(captures) = regex.captures(&normalized) {
                let mut params = BTreeMap::new();
                for (index, name) in names.iter().enumerate() {
                    if let Some(value) = captures.get(index + 1) {
                        params.insert(name.clone(), percent_decode(value.as_str()));
                    }
                }
                return Some(MatchedRoute {
                    route: entry.route.clone(),
                    params,
                });
            }
        }
        self.entries
            .iter()
            .find(|entry| entry.route.is_wildcard())
            .map(|entry| MatchedRoute {
                route: entry.route.clone(),
                params: BTreeMap::new(),
            })
    }
}

/// Enforce a leading slash and strip a single trailing slash (root excepted).
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Compile a pattern into an anchored regex plus its parameter names.
fn compile_pattern(pattern: &str) -> Result<(Regex, Vec<String>), String> {
    let normalized = normalize_path(pattern);
    let mut names = Vec::new();
    let mut source = String::from("^");
    for (index, segment) in normalized.split('/').enumerate() {
        if index > 0 {
            source.push('/');
        }
        match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                names.push(name.to_string());
                source.push_str("([^/]+)");
            }
            _ => source.push_str(&regex::escape(segment)),
        }
    }
    source.push('$');
    let regex = Regex::new(&source).map_err(|e| e.to_string())?;
    Ok((regex, names))
}

/// Decode percent-escapes in a path segment or query component.
pub fn percent_decode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::document::Audience;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn route(endpoint: &str) -> Route {
        Route {
            endpoint: endpoint.into(),
            method: None,
            audience: Audience::FE,
            middlewares: vec![],
            view: json!({"title": endpoint, "render": {"element": "div"}}),
        }
    }

    fn backend_route(endpoint: &str, method: &str) -> Route {
        Route {
            endpoint: endpoint.into(),
            method: Some(method.into()),
            audience: Audience::BE,
            middlewares: vec![],
            view: json!("[\"do\"]"),
        }
    }

    #[test]
    fn test_named_parameter_extraction() {
        let table = RouteTable::new(vec![route("/users/:id")]);
        let matched = table.match_path("/users/42").unwrap();
        assert_eq!(matched.params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_trailing_slash_normalization() {
        let table = RouteTable::new(vec![route("/a/:x")]);
        let with_slash = table.match_path("/a/b/").unwrap();
        let without = table.match_path("/a/b").unwrap();
        assert_eq!(with_slash.params, without.params);
    }

    #[test]
    fn test_missing_leading_slash_on_pattern() {
        let table = RouteTable::new(vec![route("about")]);
        assert!(table.match_path("/about").is_some());
    }

    #[test]
    fn test_root_pattern_survives_normalization() {
        let table = RouteTable::new(vec![route("/")]);
        assert!(table.match_path("/").is_some());
        assert!(table.match_path("/other").is_none());
    }

    #[test]
    fn test_document_order_wins() {
        let table = RouteTable::new(vec![route("/users/me"), route("/users/:id")]);
        let matched = table.match_path("/users/me").unwrap();
        assert_eq!(matched.route.endpoint, "/users/me");
        assert!(matched.params.is_empty());
    }

    #[test]
    fn test_exact_match_beats_wildcard() {
        let table = RouteTable::new(vec![route("*"), route("/home")]);
        let matched = table.match_path("/home").unwrap();
        assert_eq!(matched.route.endpoint, "/home");
    }

    #[test]
    fn test_wildcard_fallback() {
        let table = RouteTable::new(vec![route("/home"), route("*")]);
        let matched = table.match_path("/nowhere").unwrap();
        assert!(matched.route.is_wildcard());
        assert!(matched.params.is_empty());
    }

    #[test]
    fn test_no_match_without_wildcard() {
        let table = RouteTable::new(vec![route("/home")]);
        assert!(table.match_path("/nowhere").is_none());
    }

    #[test]
    fn test_wildcard_not_pattern_matched() {
        // `*` must never match as a literal path segment.
        let table = RouteTable::new(vec![route("*")]);
        let matched = table.match_path("/star").unwrap();
        assert!(matched.route.is_wildcard());
    }

    #[test]
    fn test_multiple_parameters() {
        let table = RouteTable::new(vec![route("/shops/:shop/items/:item")]);
        let matched = table.match_path("/shops/7/items/42").unwrap();
        assert_eq!(matched.params.get("shop").map(String::as_str), Some("7"));
        assert_eq!(matched.params.get("item").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_parameter_percent_decoding() {
        let table = RouteTable::new(vec![route("/tags/:name")]);
        let matched = table.match_path("/tags/hello%20world").unwrap();
        assert_eq!(
            matched.params.get("name").map(String::as_str),
            Some("hello world")
        );
    }

    #[test]
    fn test_method_filter() {
        let table = RouteTable::new(vec![
            backend_route("/api/items", "GET"),
            backend_route("/api/items", "POST"),
        ]);
        let matched = table.match_request("POST", "/api/items").unwrap();
        assert_eq!(matched.route.method.as_deref(), Some("POST"));
        assert!(table.match_request("DELETE", "/api/items").is_none());
    }

    #[test]
    fn test_segment_must_be_non_empty() {
        let table = RouteTable::new(vec![route("/users/:id")]);
        assert!(table.match_path("/users/").is_none());
        assert!(table.match_path("/users").is_none());
    }
}
