//! Compiled form of a resolved grammar
//!
//! Token patterns are compiled to anchored regexes once, at load time, and
//! multi-word literals (patterns or enumerated values containing spaces) are
//! pre-extracted into a longest-first table so the tokenizer can try them
//! before splitting on whitespace. An invalid pattern is a grammar-authoring
//! defect, not a runtime fault: it is logged and the token simply never
//! matches.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use super::model::{Grammar, TokenDefinition};

/// A resolved grammar plus its compiled matching artifacts.
#[derive(Debug)]
pub struct CompiledGrammar {
    pub grammar: Grammar,
    regexes: HashMap<String, Regex>,
    multiword: Vec<MultiWordLiteral>,
}

/// One pre-extracted multi-word literal.
#[derive(Debug, Clone)]
pub struct MultiWordLiteral {
    /// The literal text, as declared (uppercase by TAC convention).
    pub literal: String,
    /// Token id the literal resolves to.
    pub token_id: String,
}

/// Characters that make a pattern a real regex rather than a literal.
const REGEX_META: &[char] = &[
    '\\', '.', '[', ']', '{', '}', '(', ')', '*', '+', '?', '|', '^', '$',
];

fn is_literal_pattern(pattern: &str) -> bool {
    !pattern.contains(REGEX_META)
}

impl CompiledGrammar {
    /// Compiles a resolved grammar. Never fails; unusable patterns are
    /// dropped with a diagnostic.
    pub fn compile(grammar: Grammar) -> Self {
        let mut regexes = HashMap::new();
        let mut multiword = Vec::new();

        for (id, def) in &grammar.tokens {
            if let Some(pattern) = &def.pattern {
                if is_literal_pattern(pattern) {
                    if pattern.contains(' ') {
                        multiword.push(MultiWordLiteral {
                            literal: pattern.clone(),
                            token_id: id.clone(),
                        });
                    }
                    // Literal patterns still get a regex so single-word
                    // literals match through the same path as real patterns.
                }
                let anchored = format!("^(?:{pattern})$");
                match Regex::new(&anchored) {
                    Ok(re) => {
                        regexes.insert(id.clone(), re);
                    }
                    Err(err) => {
                        warn!(
                            token = %id,
                            pattern = %pattern,
                            %err,
                            "invalid token pattern, token will never match"
                        );
                    }
                }
            }
            for value in &def.values {
                if value.contains(' ') {
                    multiword.push(MultiWordLiteral {
                        literal: value.clone(),
                        token_id: id.clone(),
                    });
                }
            }
        }

        // Longest first so "VA ADVISORY TEST" shadows "VA ADVISORY".
        multiword.sort_by(|a, b| b.literal.len().cmp(&a.literal.len()));

        Self {
            grammar,
            regexes,
            multiword,
        }
    }

    /// True if `word` is an acceptable value for token `id`.
    ///
    /// Enumerated values are compared case-insensitively; patterns must match
    /// the whole word.
    pub fn token_matches(&self, id: &str, word: &str) -> bool {
        let Some(def) = self.grammar.tokens.get(id) else {
            return false;
        };
        if def
            .values
            .iter()
            .any(|v| v.eq_ignore_ascii_case(word))
        {
            return true;
        }
        self.regexes.get(id).is_some_and(|re| re.is_match(word))
    }

    /// Tries the multi-word literal table against the start of `rest`.
    ///
    /// Returns the byte length consumed and the token id of the longest
    /// literal that matches case-insensitively and ends at a word boundary.
    pub fn match_multiword(&self, rest: &str) -> Option<(usize, &str)> {
        for entry in &self.multiword {
            let len = entry.literal.len();
            if rest.len() < len {
                continue;
            }
            if !rest.is_char_boundary(len) {
                continue;
            }
            if !rest[..len].eq_ignore_ascii_case(&entry.literal) {
                continue;
            }
            let boundary_ok = rest[len..]
                .chars()
                .next()
                .is_none_or(char::is_whitespace);
            if boundary_ok {
                return Some((len, &entry.token_id));
            }
        }
        None
    }

    pub fn token_def(&self, id: &str) -> Option<&TokenDefinition> {
        self.grammar.tokens.get(id)
    }

    pub fn name(&self) -> Option<&str> {
        self.grammar.name.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.grammar.code.as_deref()
    }

    pub fn standard(&self) -> Option<&str> {
        self.grammar.standard.as_deref()
    }

    pub fn lang(&self) -> Option<&str> {
        self.grammar.lang.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(json: &str) -> CompiledGrammar {
        CompiledGrammar::compile(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn patterns_are_anchored() {
        let g = compile(r#"{"tokens": {"num": {"pattern": "[0-9]{2}"}}}"#);
        assert!(g.token_matches("num", "42"));
        assert!(!g.token_matches("num", "423"), "must match the whole word");
        assert!(!g.token_matches("num", "x42"));
    }

    #[test]
    fn enumerated_values_match_case_insensitively() {
        let g = compile(r#"{"tokens": {"cavok": {"values": ["CAVOK"]}}}"#);
        assert!(g.token_matches("cavok", "CAVOK"));
        assert!(g.token_matches("cavok", "cavok"));
        assert!(!g.token_matches("cavok", "CAVO"));
    }

    #[test]
    fn multiword_literals_extracted_longest_first() {
        let g = compile(
            r#"{"tokens": {
                "va": {"pattern": "VA ADVISORY"},
                "vatest": {"values": ["VA ADVISORY TEST"]},
                "wind": {"pattern": "[0-9]{5}KT"}
            }}"#,
        );

        let (len, id) = g.match_multiword("VA ADVISORY TEST DTG").unwrap();
        assert_eq!(id, "vatest");
        assert_eq!(len, "VA ADVISORY TEST".len());

        let (len, id) = g.match_multiword("va advisory next").unwrap();
        assert_eq!(id, "va");
        assert_eq!(len, "VA ADVISORY".len());

        // Mid-word prefix is not a match
        assert!(g.match_multiword("VA ADVISORYX").is_none());
        assert!(g.match_multiword("12345KT").is_none());
    }

    #[test]
    fn invalid_pattern_is_dropped_not_fatal() {
        let g = compile(r#"{"tokens": {"bad": {"pattern": "[unclosed"}}}"#);
        assert!(!g.token_matches("bad", "anything"));
    }
}
