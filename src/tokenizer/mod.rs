//! Tokenizer
//!
//! Splits raw message text into typed, validated tokens. Spans are byte
//! offsets into the input; together the tokens are contiguous,
//! non-overlapping, and cover the text exactly. Runs of whitespace
//! (newlines included) are kept verbatim as `whitespace` tokens so the
//! editor can reconstruct the document from the token list alone.
//!
//! Matching order at each word position:
//! 1. multi-word literals (longest first, case-insensitive),
//! 2. tokens the Structure Tracker currently expects, tried in grammar
//!    declaration order,
//! 3. exhaustive fallback over all greedy token definitions.
//!
//! A word recognized by the fallback but rejected by the tracker, or not
//! recognized at all, becomes an `error` token; tokenization continues with
//! the next word. After structural matching each token runs through the
//! semantic validator hook, which may attach an error message without
//! changing the token's span or type.

pub mod template;

use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::grammar::CompiledGrammar;
use crate::structure::StructureTracker;
use crate::validate::{ValidationRequest, ValidatorRegistry};

/// Resolved type of a parsed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A token definition id from the grammar.
    Id(String),
    Whitespace,
    Error,
}

impl TokenKind {
    pub fn as_str(&self) -> &str {
        match self {
            TokenKind::Id(id) => id,
            TokenKind::Whitespace => "whitespace",
            TokenKind::Error => "error",
        }
    }
}

impl Serialize for TokenKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One parsed segment of the message text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Set for `error` tokens and for tokens a validator rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Token {
    fn new(start: usize, text: &str, kind: TokenKind) -> Self {
        Self {
            start,
            end: start + text.len(),
            text: text.to_string(),
            kind,
            category: None,
            error: None,
            description: None,
        }
    }

    pub(crate) fn whitespace(start: usize, text: &str) -> Self {
        Self::new(start, text, TokenKind::Whitespace)
    }

    pub(crate) fn error(start: usize, text: &str, message: impl Into<String>) -> Self {
        let mut token = Self::new(start, text, TokenKind::Error);
        token.error = Some(message.into());
        token
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }

    pub fn is_error(&self) -> bool {
        self.kind == TokenKind::Error
    }

    /// True for tokens carrying either kind of error message.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Tokenizes `text` against a compiled grammar.
///
/// Selects the template tokenizer when the grammar declares
/// `templateMode`; otherwise scans left to right as described in the module
/// docs. Never fails: unmatched input degrades to `error` tokens.
pub fn tokenize(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    text: &str,
) -> Vec<Token> {
    if grammar.grammar.template_mode {
        return template::tokenize_template(grammar, validators, text);
    }

    let mut tracker = StructureTracker::new(&grammar.grammar.structure);
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let first = rest.chars().next().expect("rest is non-empty");

        if first.is_whitespace() {
            let end = rest
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(rest.len());
            tokens.push(Token::whitespace(pos, &rest[..end]));
            pos += end;
            continue;
        }

        if let Some((len, id)) = grammar.match_multiword(rest) {
            let id = id.to_string();
            let word = &rest[..len];
            tokens.push(match_to_token(
                grammar, validators, &mut tracker, text, pos, word, &id, true,
            ));
            pos += len;
            continue;
        }

        let word_len = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        let word = &rest[..word_len];
        tokens.push(match_word(
            grammar, validators, &mut tracker, text, pos, word,
        ));
        pos += word_len;
    }

    trace!(
        tokens = tokens.len(),
        errors = tokens.iter().filter(|t| t.is_error()).count(),
        "tokenized message"
    );
    tokens
}

/// Resolves one word against the grammar: expected tokens first, then the
/// exhaustive greedy fallback.
fn match_word(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    tracker: &mut StructureTracker<'_>,
    full_text: &str,
    pos: usize,
    word: &str,
) -> Token {
    let expected: FxHashSet<&str> = tracker.expected_token_ids().into_iter().collect();

    // Expected tokens, in grammar declaration order
    for id in grammar.grammar.tokens.keys() {
        if expected.contains(id.as_str()) && grammar.token_matches(id, word) {
            let id = id.clone();
            return match_to_token(
                grammar, validators, tracker, full_text, pos, word, &id, false,
            );
        }
    }

    // Exhaustive fallback, excluding non-greedy catch-alls
    for (id, def) in &grammar.grammar.tokens {
        if def.greedy && grammar.token_matches(id, word) {
            let id = id.clone();
            return match_to_token(
                grammar, validators, tracker, full_text, pos, word, &id, false,
            );
        }
    }

    debug!(%word, "no token definition matches");
    Token::error(pos, word, format!("Unrecognized text \"{word}\""))
}

/// Builds the token for a lexical match, advancing the tracker. A match the
/// structure rejects (out of order, or cardinality exhausted) becomes an
/// `error` token instead.
#[allow(clippy::too_many_arguments)]
fn match_to_token(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    tracker: &mut StructureTracker<'_>,
    full_text: &str,
    pos: usize,
    word: &str,
    id: &str,
    multiword: bool,
) -> Token {
    if !tracker.try_match(id) {
        debug!(%word, token = %id, %multiword, "structure rejects token");
        return Token::error(pos, word, format!("\"{word}\" is not expected here"));
    }
    typed_token(grammar, validators, full_text, pos, word, id)
}

/// Builds a typed token and runs the semantic validator hook. Shared with
/// the template tokenizer, which matches against a label table instead of
/// the structure tree.
pub(crate) fn typed_token(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    full_text: &str,
    pos: usize,
    word: &str,
    id: &str,
) -> Token {
    let def = grammar.token_def(id);
    let mut token = Token::new(pos, word, TokenKind::Id(id.to_string()));
    token.category = def.and_then(|d| d.category.clone());
    token.description = def.and_then(|d| d.description.clone());

    let request = ValidationRequest {
        token_value: word,
        token_type: id,
        full_text,
        position: pos,
        grammar_name: grammar.name(),
        grammar_code: grammar.code(),
        grammar_standard: grammar.standard(),
        grammar_lang: grammar.lang(),
    };
    if let Some(message) = validators.run(grammar, id, &request) {
        token.error = Some(message);
    }
    token
}
