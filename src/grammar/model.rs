//! Data model for grammar documents
//!
//! A grammar is a declarative description of one TAC message type: its token
//! definitions, the structural rule tree constraining their order, and the
//! suggestion declarations driving the authoring aid. Grammars are plain data
//! deserialized from JSON; nothing here executes.
//!
//! Token maps use [`IndexMap`] so that matching and suggestion expansion see
//! tokens in grammar declaration order, which grammar authors rely on to
//! resolve pattern ambiguity (more specific tokens are declared first).

use indexmap::IndexMap;
use serde::Deserialize;

/// One message-type grammar, as authored.
///
/// `extends` may reference a parent grammar by name; see
/// [`crate::grammar::inheritance::resolve`] for the merge policy. After
/// resolution a grammar is self-contained and immutable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Grammar {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Message identifier text, possibly multi-word ("VA ADVISORY").
    pub identifier: Option<String>,
    /// The identifier follows a FIR designator ("LFFF SIGMET ..."), so
    /// detection also tries the second word of a message.
    pub fir_prefixed: bool,
    /// Name of the parent grammar this one inherits from.
    pub extends: Option<String>,
    pub category: Option<String>,
    /// Two-letter TAC code ("sa" for METAR, "ft" for TAF, ...), first
    /// segment of dispatch keys.
    pub code: Option<String>,
    /// Regional standard ("wmo", "faa", ...), second segment of dispatch keys.
    pub standard: Option<String>,
    /// Language tag, third segment of dispatch keys.
    pub lang: Option<String>,
    /// Selects the fixed-label template tokenizer instead of the normal one.
    pub template_mode: bool,
    pub template: Option<Template>,
    pub tokens: IndexMap<String, TokenDefinition>,
    /// Root structural rule: an ordered node list matched left to right.
    pub structure: Vec<StructureNode>,
    pub suggestions: SuggestionDecls,
}

impl Grammar {
    /// True once no unresolved parent reference remains.
    pub fn is_resolved(&self) -> bool {
        self.extends.is_none()
    }
}

/// Definition of a single token type within a grammar.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenDefinition {
    /// Regular expression the token value must match in full.
    pub pattern: Option<String>,
    /// Enumerated literal values, matched case-insensitively.
    pub values: Vec<String>,
    /// Category label used for styling, grouping, and provider fallback.
    pub category: Option<String>,
    /// Name of a registered semantic validator to run on each match.
    pub validator: Option<String>,
    /// Id of a registered suggestion provider for this token.
    pub provider: Option<String>,
    /// Token attaches to the previous one without separating whitespace.
    pub append_to_previous: bool,
    /// Default text with editable sub-ranges, offered when no explicit
    /// suggestion items exist.
    pub placeholder: Option<Placeholder>,
    /// When false the token is excluded from the exhaustive fallback scan.
    /// Catch-all patterns (free-text remark bodies) set this so they only
    /// match where the structure explicitly expects them.
    pub greedy: bool,
    pub description: Option<String>,
}

impl Default for TokenDefinition {
    fn default() -> Self {
        Self {
            pattern: None,
            values: Vec::new(),
            category: None,
            validator: None,
            provider: None,
            append_to_previous: false,
            placeholder: None,
            greedy: true,
            description: None,
        }
    }
}

/// Default value for a token plus the sub-ranges the user is expected to edit.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Placeholder {
    pub text: String,
    /// Byte ranges within `text`, as `[start, end)` pairs.
    pub editable: Vec<EditableRange>,
}

/// A `[start, end)` byte range, serialized as a two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, serde::Serialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct EditableRange {
    pub start: usize,
    pub end: usize,
}

impl From<(usize, usize)> for EditableRange {
    fn from((start, end): (usize, usize)) -> Self {
        Self { start, end }
    }
}

impl From<EditableRange> for (usize, usize) {
    fn from(range: EditableRange) -> Self {
        (range.start, range.end)
    }
}

/// How many times a structural node may match: `[min, max]`, with
/// `max = None` meaning unbounded. Serialized as `[min, max|null]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(u32, Option<u32>)")]
pub struct Cardinality {
    pub min: u32,
    pub max: Option<u32>,
}

impl Cardinality {
    /// Exactly once.
    pub const ONCE: Cardinality = Cardinality { min: 1, max: Some(1) };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// True if `count` has reached the upper bound.
    pub fn saturated(&self, count: u32) -> bool {
        self.max.is_some_and(|max| count >= max)
    }
}

impl From<(u32, Option<u32>)> for Cardinality {
    fn from((min, max): (u32, Option<u32>)) -> Self {
        Self { min, max }
    }
}

/// One node of the structural rule tree.
///
/// Every node carries an `id` (the token id for leaves, a label for
/// composites) and a cardinality bounding its repetition. The shape lives in
/// [`StructureKind`]; consumers pattern-match on it exhaustively.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawStructureNode")]
pub struct StructureNode {
    pub id: String,
    pub cardinality: Cardinality,
    pub kind: StructureKind,
}

/// The three structural shapes.
#[derive(Debug, Clone)]
pub enum StructureKind {
    /// Leaf referencing a token definition by id. `terminal` marks nodes
    /// after which a message is considered complete.
    Token { terminal: bool },
    /// Ordered children, all satisfied in order per repetition of the node.
    Sequence(Vec<StructureNode>),
    /// Mutually exclusive alternatives; matching commits to the first one
    /// that accepts a token.
    OneOf(Vec<StructureNode>),
}

/// Wire shape of a structure node: the variant is discriminated by which of
/// `oneOf` / `sequence` is present, a plain `{id, cardinality}` object being
/// a token leaf.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructureNode {
    id: String,
    #[serde(default = "default_cardinality")]
    cardinality: Cardinality,
    #[serde(default)]
    terminal: bool,
    one_of: Option<Vec<RawStructureNode>>,
    sequence: Option<Vec<RawStructureNode>>,
}

fn default_cardinality() -> Cardinality {
    Cardinality::ONCE
}

impl From<RawStructureNode> for StructureNode {
    fn from(raw: RawStructureNode) -> Self {
        let kind = if let Some(alts) = raw.one_of {
            StructureKind::OneOf(alts.into_iter().map(StructureNode::from).collect())
        } else if let Some(children) = raw.sequence {
            StructureKind::Sequence(children.into_iter().map(StructureNode::from).collect())
        } else {
            StructureKind::Token {
                terminal: raw.terminal,
            }
        };
        StructureNode {
            id: raw.id,
            cardinality: raw.cardinality,
            kind,
        }
    }
}

/// Suggestion declarations of a grammar.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestionDecls {
    /// Static suggestion items offered when a token becomes expected.
    pub items: IndexMap<String, Vec<SuggestionItem>>,
    /// Successor lists: token-id (or "start") to the token ids legal next.
    pub after: IndexMap<String, Vec<String>>,
}

/// One declared suggestion item.
///
/// The wire discriminant is the optional `type` field; an item without one is
/// a plain value.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawSuggestionItem")]
pub enum SuggestionItem {
    Value(ValueItem),
    /// "Nothing to insert here, move to the next token."
    Skip,
    /// Submenu of nested items.
    Category {
        text: String,
        description: Option<String>,
        children: Vec<SuggestionItem>,
    },
    /// Applying this item switches the editor to another grammar.
    SwitchGrammar { text: String, target: String },
}

/// A plain value suggestion.
#[derive(Debug, Clone, Default)]
pub struct ValueItem {
    pub text: String,
    pub description: Option<String>,
    pub editable: Vec<EditableRange>,
    /// Insert a newline before the value.
    pub new_line_before: bool,
    /// Only applied automatically, never listed for manual selection.
    pub auto: bool,
    /// Append to the previous token without separating whitespace.
    pub append_to_previous: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSuggestionItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    text: Option<String>,
    description: Option<String>,
    editable: Vec<EditableRange>,
    new_line_before: bool,
    auto: bool,
    append_to_previous: bool,
    children: Vec<RawSuggestionItem>,
    target: Option<String>,
}

impl Default for RawSuggestionItem {
    fn default() -> Self {
        Self {
            item_type: None,
            text: None,
            description: None,
            editable: Vec::new(),
            new_line_before: false,
            auto: false,
            append_to_previous: false,
            children: Vec::new(),
            target: None,
        }
    }
}

impl From<RawSuggestionItem> for SuggestionItem {
    fn from(raw: RawSuggestionItem) -> Self {
        match raw.item_type.as_deref() {
            Some("skip") => SuggestionItem::Skip,
            Some("category") => SuggestionItem::Category {
                text: raw.text.unwrap_or_default(),
                description: raw.description,
                children: raw.children.into_iter().map(SuggestionItem::from).collect(),
            },
            Some("switchGrammar") => SuggestionItem::SwitchGrammar {
                text: raw.text.clone().or(raw.target.clone()).unwrap_or_default(),
                target: raw.target.or(raw.text).unwrap_or_default(),
            },
            _ => SuggestionItem::Value(ValueItem {
                text: raw.text.unwrap_or_default(),
                description: raw.description,
                editable: raw.editable,
                new_line_before: raw.new_line_before,
                auto: raw.auto,
                append_to_previous: raw.append_to_previous,
            }),
        }
    }
}

/// Template definition for fixed-label message forms (advisories).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Template {
    pub fields: Vec<TemplateField>,
}

/// One labelled line of a template form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateField {
    /// Label text matched case-insensitively as a line prefix ("DTG:").
    pub label: String,
    /// Token id the field value is tokenized against.
    pub value_type: Option<String>,
    pub required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_node_shapes_deserialize() {
        let json = r#"[
            {"id": "kw", "cardinality": [1, 1]},
            {"id": "num", "cardinality": [0, 3]},
            {"id": "wind", "cardinality": [0, null], "oneOf": [
                {"id": "calm"},
                {"id": "gusts", "sequence": [{"id": "dir"}, {"id": "speed"}]}
            ]}
        ]"#;
        let nodes: Vec<StructureNode> = serde_json::from_str(json).unwrap();
        assert_eq!(nodes.len(), 3);

        assert!(matches!(nodes[0].kind, StructureKind::Token { .. }));
        assert_eq!(nodes[0].cardinality, Cardinality::ONCE);

        assert_eq!(nodes[1].cardinality, Cardinality::new(0, Some(3)));

        let StructureKind::OneOf(alts) = &nodes[2].kind else {
            panic!("expected oneOf");
        };
        assert_eq!(nodes[2].cardinality.max, None);
        assert!(matches!(alts[0].kind, StructureKind::Token { .. }));
        let StructureKind::Sequence(children) = &alts[1].kind else {
            panic!("expected sequence");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].id, "dir");
    }

    #[test]
    fn suggestion_items_discriminated_by_type_field() {
        let json = r#"[
            {"text": "CAVOK", "description": "Ceiling and visibility OK"},
            {"type": "skip"},
            {"type": "category", "text": "Clouds", "children": [{"text": "FEW"}]},
            {"type": "switchGrammar", "target": "TAF"}
        ]"#;
        let items: Vec<SuggestionItem> = serde_json::from_str(json).unwrap();

        let SuggestionItem::Value(v) = &items[0] else {
            panic!("expected value");
        };
        assert_eq!(v.text, "CAVOK");
        assert!(matches!(items[1], SuggestionItem::Skip));
        let SuggestionItem::Category { text, children, .. } = &items[2] else {
            panic!("expected category");
        };
        assert_eq!(text, "Clouds");
        assert_eq!(children.len(), 1);
        let SuggestionItem::SwitchGrammar { target, .. } = &items[3] else {
            panic!("expected switchGrammar");
        };
        assert_eq!(target, "TAF");
    }

    #[test]
    fn token_definition_defaults() {
        let def: TokenDefinition = serde_json::from_str(r#"{"pattern": "[0-9]{4}"}"#).unwrap();
        assert!(def.greedy, "tokens are greedy unless opted out");
        assert!(!def.append_to_previous);

        let remark: TokenDefinition =
            serde_json::from_str(r#"{"pattern": ".*", "greedy": false}"#).unwrap();
        assert!(!remark.greedy);
    }

    #[test]
    fn grammar_declaration_order_is_preserved() {
        let json = r#"{
            "name": "METAR",
            "tokens": {
                "cavok": {"values": ["CAVOK"]},
                "wind": {"pattern": "[0-9]{5}KT"},
                "station": {"pattern": "[A-Z]{4}"}
            }
        }"#;
        let grammar: Grammar = serde_json::from_str(json).unwrap();
        let order: Vec<&str> = grammar.tokens.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["cavok", "wind", "station"]);
    }
}
