//! Template Variable Resolver
//!
//! Expands the two substitution syntaxes embedded in a serialized element
//! tree. They are deliberately kept as two separate, order-dependent passes
//! over plain text: they are distinct micro-languages with different
//! substitution sources and must never merge into one grammar.
//!
//! # Action Variables
//!
//! `#*name*#` tokens are simple literal replacements from the view's own
//! `action` map. Names the map does not declare are left untouched; they
//! are not guaranteed to exist.
//!
//! # Component Variables
//!
//! `#|name|k=v,...|#` tokens reference a stored component by key. The
//! component's serialized fragment has every `#k#` token replaced with the
//! value from the pair list, is recursively resolved (its own view may
//! reference further components), and then splices into the outer tree in
//! place of the token. The action pass strictly precedes the component
//! pass, and component tokens resolve left to right, outer tree first.
//!
//! # Recursion Ceiling
//!
//! A component that references itself, directly or transitively, would
//! expand forever. Expansion carries an explicit depth counter; crossing
//! the ceiling is a resolution fault, not a stack overflow.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::shared::error::{EngineError, EngineResult};

/// Default ceiling for nested component expansion.
pub const DEFAULT_DEPTH_LIMIT: usize = 16;

/// One `#|name|pairs|#` token found in serialized text
#[derive(Debug, Clone, PartialEq)]
struct ComponentToken {
    /// Component key
    name: String,
    /// Substitution pairs parsed from the token
    pairs: BTreeMap<String, String>,
    /// Raw token text as it appears in the input
    raw: String,
}

fn component_token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"#\|([^|]+?)\|([^|]+?)\|#").expect("component token pattern is valid")
    })
}

/// Replace every `#*name*#` occurrence with its literal from the action map.
pub fn resolve_actions(input: &str, actions: &BTreeMap<String, String>) -> String {
    let mut output = input.to_string();
    for (name, value) in actions {
        let token = format!("#*{}*#", name);
        output = output.replace(&token, value);
    }
    output
}

/// Expand every component variable in the input, recursively.
///
/// `lookup` maps a component key to its serialized fragment, or `None` when
/// the key is unknown. Expansion is bounded by `depth_limit`.
///
/// # Errors
///
/// A resolution fault when a referenced component is missing or the depth
/// ceiling is crossed.
pub fn resolve_components<F>(input: &str, lookup: &F, depth_limit: usize) -> EngineResult<String>
where
    F: Fn(&str) -> EngineResult<Option<String>>,
{
    expand(input, lookup, depth_limit, 0)
}

/// Run both passes in their required order: actions, then components.
pub fn resolve<F>(
    input: &str,
    actions: &BTreeMap<String, String>,
    lookup: &F,
    depth_limit: usize,
) -> EngineResult<String>
where
    F: Fn(&str) -> EngineResult<Option<String>>,
{
    let after_actions = resolve_actions(input, actions);
    resolve_components(&after_actions, lookup, depth_limit)
}

fn expand<F>(input: &str, lookup: &F, depth_limit: usize, depth: usize) -> EngineResult<String>
where
    F: Fn(&str) -> EngineResult<Option<String>>,
{
    if depth > depth_limit {
        return Err(EngineError::resolution(format!(
            "component expansion exceeded depth ceiling {}",
            depth_limit
        )));
    }

    let mut output = input.to_string();
    // Every iteration consumes one token; spliced fragments arrive fully
    // resolved, so the loop terminates once the original tokens are gone.
    while let Some(token) = next_token(&output) {
        let fragment = lookup(&token.name)?.ok_or_else(|| {
            EngineError::resolution(format!("component '{}' not found", token.name))
        })?;

        let mut substituted = fragment;
        for (key, value) in &token.pairs {
            substituted = substituted.replace(&format!("#{}#", key), value);
        }
        let resolved = expand(&substituted, lookup, depth_limit, depth + 1)?;

        output = splice(&output, &token.raw, &resolved);
    }
    Ok(output)
}

/// Find the leftmost component token in the text.
fn next_token(input: &str) -> Option<ComponentToken> {
    let captures = component_token_regex().captures(input)?;
    let raw = captures.get(0)?.as_str().to_string();
    let name = captures.get(1)?.as_str().trim().to_string();
    let mut pairs = BTreeMap::new();
    for pair in captures.get(2)?.as_str().split(',') {
        if let Some((key, value)) = pair.split_once('=') {
            pairs.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    Some(ComponentToken { name, pairs, raw })
}

/// Replace one token occurrence with its resolved fragment.
///
/// Tokens normally sit in the tree as JSON string children, so the quoted
/// form is replaced first, letting the fragment splice in as a tree node.
/// A token embedded mid-string falls back to a plain text splice.
fn splice(input: &str, raw: &str, fragment: &str) -> String {
    let quoted = format!("\"{}\"", raw);
    if input.contains(&quoted) {
        input.replacen(&quoted, fragment, 1)
    } else {
        input.replacen(raw, fragment, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(map: HashMap<&'static str, &'static str>) -> impl Fn(&str) -> EngineResult<Option<String>> {
        move |key: &str| Ok(map.get(key).map(|s| s.to_string()))
    }

    fn no_components() -> impl Fn(&str) -> EngineResult<Option<String>> {
        |_key: &str| Ok(None)
    }

    #[test]
    fn test_action_substitution() {
        let mut actions = BTreeMap::new();
        actions.insert("greeting".to_string(), "Hi".to_string());
        assert_eq!(
            resolve_actions("#*greeting*#, world", &actions),
            "Hi, world"
        );
    }

    #[test]
    fn test_unknown_action_left_untouched() {
        let actions = BTreeMap::new();
        assert_eq!(
            resolve_actions("#*missing*# stays", &actions),
            "#*missing*# stays"
        );
    }

    #[test]
    fn test_action_replaces_every_occurrence() {
        let mut actions = BTreeMap::new();
        actions.insert("x".to_string(), "1".to_string());
        assert_eq!(resolve_actions("#*x*# + #*x*#", &actions), "1 + 1");
    }

    #[test]
    fn test_component_substitution_into_tree() {
        let outer = r##"{"element":"div","children":["#|card|title=Hello|#"]}"##;
        let lookup = lookup_from(HashMap::from([(
            "card",
            r##"{"element":"section","children":["#title#"]}"##,
        )]));
        let resolved = resolve_components(outer, &lookup, DEFAULT_DEPTH_LIMIT).unwrap();
        let tree: serde_json::Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(
            tree,
            json!({
                "element": "div",
                "children": [{"element": "section", "children": ["Hello"]}]
            })
        );
    }

    #[test]
    fn test_nested_component_expansion() {
        let outer = r##"{"element":"div","children":["#|outer|label=Go|#"]}"##;
        let lookup = lookup_from(HashMap::from([
            (
                "outer",
                r##"{"element":"nav","children":["#|inner|text=#label#|#"]}"##,
            ),
            ("inner", r##"{"element":"a","children":["#text#"]}"##),
        ]));
        let resolved = resolve_components(outer, &lookup, DEFAULT_DEPTH_LIMIT).unwrap();
        let tree: serde_json::Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(
            tree,
            json!({
                "element": "div",
                "children": [{
                    "element": "nav",
                    "children": [{"element": "a", "children": ["Go"]}]
                }]
            })
        );
    }

    #[test]
    fn test_each_occurrence_uses_its_own_pairs() {
        let outer = r##"["#|chip|text=A|#","#|chip|text=B|#"]"##;
        let lookup = lookup_from(HashMap::from([(
            "chip",
            r##"{"element":"span","children":["#text#"]}"##,
        )]));
        let resolved = resolve_components(outer, &lookup, DEFAULT_DEPTH_LIMIT).unwrap();
        let tree: serde_json::Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(tree[0]["children"][0], json!("A"));
        assert_eq!(tree[1]["children"][0], json!("B"));
    }

    #[test]
    fn test_self_referencing_component_faults() {
        let outer = r##"["#|loop|x=1|#"]"##;
        let lookup = lookup_from(HashMap::from([(
            "loop",
            r##"{"element":"div","children":["#|loop|x=1|#"]}"##,
        )]));
        let result = resolve_components(outer, &lookup, DEFAULT_DEPTH_LIMIT);
        assert!(matches!(result, Err(EngineError::Resolution { .. })));
    }

    #[test]
    fn test_missing_component_faults() {
        let outer = r##"["#|ghost|x=1|#"]"##;
        let result = resolve_components(outer, &no_components(), DEFAULT_DEPTH_LIMIT);
        assert!(matches!(result, Err(EngineError::Resolution { .. })));
    }

    #[test]
    fn test_idempotent_on_resolved_input() {
        let resolved = r##"{"element":"div","children":["plain text"]}"##;
        let again = resolve_components(resolved, &no_components(), DEFAULT_DEPTH_LIMIT).unwrap();
        assert_eq!(again, resolved);
    }

    #[test]
    fn test_actions_run_before_components() {
        // The action literal feeds the component's pair list.
        let outer = r##"["#|chip|text=#*word*#|#"]"##;
        let mut actions = BTreeMap::new();
        actions.insert("word".to_string(), "Hi".to_string());
        let lookup = lookup_from(HashMap::from([(
            "chip",
            r##"{"element":"span","children":["#text#"]}"##,
        )]));
        let resolved = resolve(outer, &actions, &lookup, DEFAULT_DEPTH_LIMIT).unwrap();
        let tree: serde_json::Value = serde_json::from_str(&resolved).unwrap();
        assert_eq!(tree[0]["children"][0], json!("Hi"));
    }

    #[test]
    fn test_pair_values_are_trimmed() {
        let token = next_token(r##""#|card|title= Hello , size=lg|#""##).unwrap();
        assert_eq!(token.name, "card");
        assert_eq!(token.pairs.get("title").map(String::as_str), Some("Hello"));
        assert_eq!(token.pairs.get("size").map(String::as_str), Some("lg"));
    }

    #[test]
    fn test_malformed_pair_skipped() {
        let token = next_token(r##""#|card|title=ok,novalue|#""##).unwrap();
        assert_eq!(token.pairs.len(), 1);
        assert!(token.pairs.contains_key("title"));
    }
}
