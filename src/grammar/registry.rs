//! Loaded-grammar registry
//!
//! Raw grammar documents are registered by name; resolved and compiled
//! grammars are cached by `(name, standard)` and immutable once built. A
//! registry belongs to one [`crate::context::EngineContext`]; there is no
//! global grammar state.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::compiled::CompiledGrammar;
use super::inheritance;
use super::model::Grammar;
use crate::error::EngineError;

/// Standard used when a grammar declares none.
pub const DEFAULT_STANDARD: &str = "wmo";

#[derive(Debug, Default)]
pub struct GrammarRegistry {
    /// Raw documents by (name, standard), as loaded, before inheritance.
    raw: DashMap<(String, String), Grammar>,
    /// Resolved and compiled grammars by (name, standard).
    compiled: DashMap<(String, String), Arc<CompiledGrammar>>,
}

impl GrammarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and registers one grammar document.
    ///
    /// Invalidates any compiled grammar cached under the same key: a reload
    /// replaces the grammar wholesale.
    pub fn load_str(&self, json: &str) -> Result<(), EngineError> {
        let grammar: Grammar = serde_json::from_str(json)?;
        let name = grammar.name.clone().unwrap_or_default();
        let standard = grammar
            .standard
            .clone()
            .unwrap_or_else(|| DEFAULT_STANDARD.to_string());
        debug!(%name, %standard, "registered grammar");
        self.compiled.remove(&(name.clone(), standard.clone()));
        self.raw.insert((name, standard), grammar);
        Ok(())
    }

    /// Loads every `*.json` grammar document in a directory.
    ///
    /// A malformed document degrades that message type to "no grammar": it
    /// is logged and skipped, and loading continues. Returns how many
    /// grammars were registered.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, EngineError> {
        let entries = fs::read_dir(dir).map_err(|source| EngineError::GrammarRead {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let json = match fs::read_to_string(&path) {
                Ok(json) => json,
                Err(err) => {
                    warn!(path = %path.display(), %err, "unreadable grammar file, skipping");
                    continue;
                }
            };
            match self.load_str(&json) {
                Ok(()) => loaded += 1,
                Err(err) => {
                    warn!(path = %path.display(), %err, "malformed grammar document, skipping");
                }
            }
        }
        Ok(loaded)
    }

    /// Returns the resolved, compiled grammar for `(name, standard)`.
    ///
    /// Falls back to the default standard when the requested one has no
    /// registration. Resolution and compilation happen on first access and
    /// the result is cached.
    pub fn get(&self, name: &str, standard: Option<&str>) -> Option<Arc<CompiledGrammar>> {
        let standard = standard.unwrap_or(DEFAULT_STANDARD);
        self.get_exact(name, standard)
            .or_else(|| (standard != DEFAULT_STANDARD).then(|| self.get_exact(name, DEFAULT_STANDARD)).flatten())
    }

    fn get_exact(&self, name: &str, standard: &str) -> Option<Arc<CompiledGrammar>> {
        let key = (name.to_string(), standard.to_string());
        if let Some(compiled) = self.compiled.get(&key) {
            return Some(compiled.clone());
        }

        let raw = self.raw.get(&key)?.clone();
        let resolved = inheritance::resolve(raw, &|parent| self.lookup_raw(parent, standard));
        let compiled = Arc::new(CompiledGrammar::compile(resolved));
        self.compiled.insert(key, compiled.clone());
        Some(compiled)
    }

    /// Ancestor lookup for inheritance: same standard first, then default.
    fn lookup_raw(&self, name: &str, standard: &str) -> Option<Grammar> {
        self.raw
            .get(&(name.to_string(), standard.to_string()))
            .or_else(|| self.raw.get(&(name.to_string(), DEFAULT_STANDARD.to_string())))
            .map(|g| g.clone())
    }

    /// Finds the grammar whose declared `identifier` opens the message.
    ///
    /// Matching is case-insensitive on a word boundary, longest identifier
    /// wins. Only grammars declaring `firPrefixed` (a SIGMET after its FIR
    /// code) are retried past the first word.
    pub fn detect(&self, text: &str) -> Option<Arc<CompiledGrammar>> {
        let head = text.trim_start();
        let past_first_word = head
            .split_once(char::is_whitespace)
            .map(|(_, rest)| rest.trim_start());

        let mut best: Option<(usize, (String, String))> = None;
        for entry in self.raw.iter() {
            let Some(identifier) = entry.value().identifier.as_deref() else {
                continue;
            };
            if identifier.is_empty() {
                continue;
            }
            let hit = starts_with_identifier(head, identifier)
                || (entry.value().fir_prefixed
                    && past_first_word.is_some_and(|rest| starts_with_identifier(rest, identifier)));
            if hit && best.as_ref().is_none_or(|(len, _)| identifier.len() > *len) {
                best = Some((identifier.len(), entry.key().clone()));
            }
        }
        let (_, (name, standard)) = best?;
        self.get_exact(&name, &standard)
    }

    /// Names of all registered grammars (deduplicated across standards).
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.raw.iter().map(|e| e.key().0.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Case-insensitive prefix match ending on whitespace or end of input.
fn starts_with_identifier(text: &str, identifier: &str) -> bool {
    let Some(head) = text.get(..identifier.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(identifier)
        && text[identifier.len()..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
}
