//! Grammar inheritance resolution
//!
//! Grammars may extend a parent (`"extends": "METAR"`), inheriting its
//! tokens, structure, and suggestions. Resolution merges the whole ancestor
//! chain into one self-contained grammar:
//!
//! - scalar fields: child value wins when present, parent's otherwise
//! - `tokens`, `suggestions.items`, `suggestions.after`: shallow-merged by
//!   key, child entries overwrite
//! - `structure`: child replaces the parent's wholesale when present
//!
//! A missing parent or an inheritance cycle is not an error: the child is
//! returned unresolved and a diagnostic is logged.

use std::collections::HashSet;

use tracing::warn;

use super::model::Grammar;

/// Resolves `raw` against its ancestor chain.
///
/// `lookup` returns the raw (unresolved) grammar registered under a name.
/// Parents are resolved recursively before merging, so a chain of any depth
/// collapses into one grammar.
pub fn resolve(raw: Grammar, lookup: &dyn Fn(&str) -> Option<Grammar>) -> Grammar {
    let mut visited = HashSet::new();
    resolve_inner(raw, lookup, &mut visited)
}

fn resolve_inner(
    raw: Grammar,
    lookup: &dyn Fn(&str) -> Option<Grammar>,
    visited: &mut HashSet<String>,
) -> Grammar {
    let Some(parent_name) = raw.extends.clone() else {
        return raw;
    };

    if !visited.insert(parent_name.clone()) {
        warn!(
            grammar = raw.name.as_deref().unwrap_or("<unnamed>"),
            parent = %parent_name,
            "inheritance cycle detected, leaving grammar unresolved"
        );
        return raw;
    }

    let Some(parent_raw) = lookup(&parent_name) else {
        warn!(
            grammar = raw.name.as_deref().unwrap_or("<unnamed>"),
            parent = %parent_name,
            "parent grammar not found, leaving grammar unresolved"
        );
        return raw;
    };

    let parent = resolve_inner(parent_raw, lookup, visited);
    merge(parent, raw)
}

/// Merges `child` over `parent` per the policy above. The result carries no
/// `extends` reference.
fn merge(parent: Grammar, child: Grammar) -> Grammar {
    let mut tokens = parent.tokens;
    for (id, def) in child.tokens {
        tokens.insert(id, def);
    }

    let mut items = parent.suggestions.items;
    for (id, list) in child.suggestions.items {
        items.insert(id, list);
    }
    let mut after = parent.suggestions.after;
    for (id, list) in child.suggestions.after {
        after.insert(id, list);
    }

    Grammar {
        name: child.name.or(parent.name),
        version: child.version.or(parent.version),
        description: child.description.or(parent.description),
        identifier: child.identifier.or(parent.identifier),
        fir_prefixed: child.fir_prefixed || parent.fir_prefixed,
        extends: None,
        category: child.category.or(parent.category),
        code: child.code.or(parent.code),
        standard: child.standard.or(parent.standard),
        lang: child.lang.or(parent.lang),
        template_mode: child.template_mode || parent.template_mode,
        template: child.template.or(parent.template),
        tokens,
        structure: if child.structure.is_empty() {
            parent.structure
        } else {
            child.structure
        },
        suggestions: super::model::SuggestionDecls { items, after },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::model::StructureKind;

    fn grammar(json: &str) -> Grammar {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn child_tokens_overwrite_parent_tokens() {
        let parent = grammar(
            r#"{
                "name": "METAR",
                "code": "sa",
                "tokens": {
                    "station": {"pattern": "[A-Z]{4}"},
                    "wind": {"pattern": "[0-9]{5}KT"}
                },
                "structure": [{"id": "station"}, {"id": "wind"}]
            }"#,
        );
        let child = grammar(
            r#"{
                "name": "SPECI",
                "extends": "METAR",
                "tokens": {
                    "wind": {"pattern": "[0-9]{5}(G[0-9]{2})?KT"}
                }
            }"#,
        );

        let resolved = resolve(child, &|name| {
            (name == "METAR").then(|| parent.clone())
        });

        assert!(resolved.is_resolved());
        assert_eq!(resolved.name.as_deref(), Some("SPECI"));
        assert_eq!(resolved.code.as_deref(), Some("sa"));
        assert_eq!(resolved.tokens.len(), 2);
        assert_eq!(
            resolved.tokens["wind"].pattern.as_deref(),
            Some("[0-9]{5}(G[0-9]{2})?KT")
        );
        // Structure inherited verbatim (child declared none)
        assert_eq!(resolved.structure.len(), 2);
        assert!(matches!(
            resolved.structure[0].kind,
            StructureKind::Token { .. }
        ));
    }

    #[test]
    fn child_structure_replaces_parent_wholesale() {
        let parent = grammar(
            r#"{
                "name": "base",
                "tokens": {"a": {}, "b": {}},
                "structure": [{"id": "a"}, {"id": "b"}]
            }"#,
        );
        let child = grammar(
            r#"{
                "name": "narrow",
                "extends": "base",
                "structure": [{"id": "b"}]
            }"#,
        );

        let resolved = resolve(child, &|_| Some(parent.clone()));
        assert_eq!(resolved.structure.len(), 1);
        assert_eq!(resolved.structure[0].id, "b");
    }

    #[test]
    fn grandparent_chain_collapses() {
        let base = grammar(r#"{"name": "base", "lang": "en", "tokens": {"a": {}}}"#);
        let mid = grammar(r#"{"name": "mid", "extends": "base", "tokens": {"b": {}}}"#);
        let leaf = grammar(r#"{"name": "leaf", "extends": "mid"}"#);

        let resolved = resolve(leaf, &|name| match name {
            "base" => Some(base.clone()),
            "mid" => Some(mid.clone()),
            _ => None,
        });

        assert!(resolved.is_resolved());
        assert_eq!(resolved.lang.as_deref(), Some("en"));
        assert!(resolved.tokens.contains_key("a"));
        assert!(resolved.tokens.contains_key("b"));
    }

    #[test]
    fn missing_parent_is_nonfatal() {
        let child = grammar(r#"{"name": "orphan", "extends": "nowhere"}"#);
        let resolved = resolve(child, &|_| None);
        assert_eq!(resolved.extends.as_deref(), Some("nowhere"));
    }

    #[test]
    fn cycle_terminates() {
        let a = grammar(r#"{"name": "a", "extends": "b"}"#);
        let b = grammar(r#"{"name": "b", "extends": "a"}"#);

        let resolved = resolve(a.clone(), &|name| match name {
            "a" => Some(a.clone()),
            "b" => Some(b.clone()),
            _ => None,
        });
        // Must return rather than loop.
        assert_eq!(resolved.name.as_deref(), Some("a"));
    }

    #[test]
    fn suggestion_maps_shallow_merge() {
        let parent = grammar(
            r#"{
                "name": "p",
                "suggestions": {
                    "items": {"wind": [{"text": "00000KT"}]},
                    "after": {"start": ["station"], "wind": ["vis"]}
                }
            }"#,
        );
        let child = grammar(
            r#"{
                "name": "c",
                "extends": "p",
                "suggestions": {
                    "after": {"wind": ["cavok"]}
                }
            }"#,
        );

        let resolved = resolve(child, &|_| Some(parent.clone()));
        assert_eq!(resolved.suggestions.items["wind"].len(), 1);
        assert_eq!(resolved.suggestions.after["start"], vec!["station"]);
        assert_eq!(resolved.suggestions.after["wind"], vec!["cavok"]);
    }
}
