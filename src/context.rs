//! Engine context
//!
//! [`EngineContext`] owns every piece of mutable engine state: the grammar
//! registry, validator and provider registries, the suggestion cache, and
//! the in-flight fetch set. Hosts create one context per editing surface
//! (or share one behind an `Arc`); nothing in the crate is a module-level
//! singleton.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::EngineError;
use crate::grammar::{CompiledGrammar, GrammarRegistry, DEFAULT_STANDARD};
use crate::structure::StructureTracker;
use crate::suggest::{
    FetchOutcome, MessageTypeConfig, ProviderRequest, Suggestion, SuggestionEngine,
};
use crate::tokenizer::{self, Token, TokenKind};
use crate::validate::ValidatorRegistry;

/// Shared engine state. Cheap to hand around: the registries are
/// internally concurrent and every mutating operation takes `&self`.
#[derive(Default)]
pub struct EngineContext {
    grammars: GrammarRegistry,
    validators: ValidatorRegistry,
    suggestions: SuggestionEngine,
    message_types: RwLock<Vec<MessageTypeConfig>>,
}

/// One problem found in a message: a lexical error, a rejected token, or a
/// validator complaint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageIssue {
    pub start: usize,
    pub end: usize,
    pub message: String,
    /// Token type the issue is attached to, when the text still lexed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

/// Result of [`EngineContext::validate_message`]: the token stream plus the
/// two non-blocking error lists.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub tokens: Vec<Token>,
    pub errors: Vec<MessageIssue>,
    /// Required token ids whose minimum cardinality is unmet at end of
    /// input. Incomplete, not erroneous: the message is still being typed.
    pub missing_required: Vec<String>,
    pub is_valid: bool,
}

impl EngineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grammars(&self) -> &GrammarRegistry {
        &self.grammars
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn suggestions(&self) -> &SuggestionEngine {
        &self.suggestions
    }

    /// Replaces the message types offered before a grammar is active.
    pub fn set_message_types(&self, types: Vec<MessageTypeConfig>) {
        *self.message_types.write() = types;
    }

    pub fn load_grammar_str(&self, json: &str) -> Result<(), EngineError> {
        self.grammars.load_str(json)
    }

    pub fn load_grammar_dir(&self, dir: &Path) -> Result<usize, EngineError> {
        self.grammars.load_dir(dir)
    }

    /// Tokenizes `text` under a named grammar.
    pub fn tokenize(
        &self,
        grammar_name: &str,
        standard: Option<&str>,
        text: &str,
    ) -> Result<Vec<Token>, EngineError> {
        let grammar =
            self.grammars
                .get(grammar_name, standard)
                .ok_or_else(|| EngineError::UnknownGrammar {
                    name: grammar_name.to_string(),
                    standard: standard.unwrap_or(DEFAULT_STANDARD).to_string(),
                })?;
        Ok(tokenizer::tokenize(&grammar, &self.validators, text))
    }

    /// Picks the grammar whose identifier opens the message, if any.
    pub fn detect_grammar(&self, text: &str) -> Option<Arc<CompiledGrammar>> {
        self.grammars.detect(text)
    }

    /// Tokenizes and summarizes: token stream, per-token issues, and the
    /// required token ids still missing at end of input.
    pub fn validate_message(
        &self,
        grammar_name: &str,
        standard: Option<&str>,
        text: &str,
    ) -> Result<ValidationReport, EngineError> {
        let grammar =
            self.grammars
                .get(grammar_name, standard)
                .ok_or_else(|| EngineError::UnknownGrammar {
                    name: grammar_name.to_string(),
                    standard: standard.unwrap_or(DEFAULT_STANDARD).to_string(),
                })?;
        let tokens = tokenizer::tokenize(&grammar, &self.validators, text);

        let errors = tokens
            .iter()
            .filter_map(|token| {
                token.error.as_ref().map(|message| MessageIssue {
                    start: token.start,
                    end: token.end,
                    message: message.clone(),
                    token_type: match &token.kind {
                        TokenKind::Id(id) => Some(id.clone()),
                        _ => None,
                    },
                })
            })
            .collect::<Vec<_>>();

        // Replay the accepted token ids to recover the tracker state the
        // tokenizer ended with.
        let mut tracker = StructureTracker::new(&grammar.grammar.structure);
        for token in &tokens {
            if let (TokenKind::Id(id), None) = (&token.kind, &token.error) {
                tracker.try_match(id);
            }
        }
        let missing_required: Vec<String> = tracker
            .missing_required()
            .into_iter()
            .map(str::to_string)
            .collect();

        debug!(
            grammar = %grammar_name,
            tokens = tokens.len(),
            errors = errors.len(),
            missing = missing_required.len(),
            "validated message"
        );
        let is_valid = errors.is_empty() && missing_required.is_empty();
        Ok(ValidationReport {
            tokens,
            errors,
            missing_required,
            is_valid,
        })
    }

    /// Suggestions for the position after `token_type`, or the message-type
    /// list when no grammar is active.
    pub async fn suggestions_for(
        &self,
        grammar: Option<&CompiledGrammar>,
        token_type: Option<&str>,
        prev_token_text: Option<&str>,
    ) -> Vec<Suggestion> {
        let types = self.message_types.read().clone();
        self.suggestions
            .suggestions_for(grammar, token_type, prev_token_text, &types)
    }

    /// Suggestions at the end of `text`: the message is tokenized and the
    /// last accepted token supplies the position.
    pub async fn suggest_at_end(
        &self,
        grammar: Option<&CompiledGrammar>,
        text: &str,
    ) -> Vec<Suggestion> {
        let last = grammar.and_then(|g| {
            let tokens = tokenizer::tokenize(g, &self.validators, text);
            tokens.into_iter().rev().find_map(|token| match token.kind {
                TokenKind::Id(id) => Some((id, token.text)),
                _ => None,
            })
        });
        match last {
            Some((token_type, text)) => {
                self.suggestions_for(grammar, Some(&token_type), Some(&text))
                    .await
            }
            None => self.suggestions_for(grammar, None, None).await,
        }
    }

    /// Triggers the provider a deferred suggestion was tagged with.
    pub async fn fetch_suggestions(
        &self,
        provider_id: &str,
        grammar: Option<&CompiledGrammar>,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> FetchOutcome {
        self.suggestions
            .fetch_suggestions(provider_id, grammar, request, cancel)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context_with_metar() -> EngineContext {
        let ctx = EngineContext::new();
        ctx.load_grammar_str(
            r#"{
                "name": "METAR",
                "identifier": "METAR",
                "code": "sa",
                "tokens": {
                    "reportType": {"values": ["METAR", "SPECI"]},
                    "station": {"pattern": "[A-Z]{4}"},
                    "day-hour-minute": {"pattern": "[0-9]{6}Z"}
                },
                "structure": [
                    {"id": "reportType", "cardinality": [1, 1]},
                    {"id": "station", "cardinality": [1, 1]},
                    {"id": "day-hour-minute", "cardinality": [1, 1]}
                ],
                "suggestions": {
                    "items": {
                        "reportType": [{"text": "METAR"}, {"text": "SPECI"}],
                        "station": [{"text": "LFPG"}]
                    },
                    "after": {"start": ["reportType"], "reportType": ["station"]}
                }
            }"#,
        )
        .unwrap();
        ctx
    }

    #[test]
    fn tokenize_requires_a_registered_grammar() {
        let ctx = context_with_metar();
        assert!(ctx.tokenize("METAR", None, "METAR LFPG").is_ok());

        let err = ctx.tokenize("TAF", None, "TAF LFPG").unwrap_err();
        assert!(matches!(err, EngineError::UnknownGrammar { .. }));
    }

    #[test]
    fn validate_reports_errors_and_missing_tokens() {
        let ctx = context_with_metar();
        let report = ctx.validate_message("METAR", None, "METAR LFPG").unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(report.missing_required, vec!["day-hour-minute"]);
        assert!(!report.is_valid);

        let complete = ctx
            .validate_message("METAR", None, "METAR LFPG 271130Z")
            .unwrap();
        assert!(complete.is_valid);

        // Each word is judged on its own: the garbage errors lexically and
        // the datetime is rejected as out of place behind the missing station
        let broken = ctx
            .validate_message("METAR", None, "METAR ?! 271130Z")
            .unwrap();
        assert_eq!(broken.errors.len(), 2);
        assert!(broken.errors[0].message.contains("Unrecognized"));
        assert!(broken.errors[1].message.contains("not expected here"));
        assert_eq!(broken.missing_required, vec!["station", "day-hour-minute"]);
        assert!(!broken.is_valid);
    }

    #[tokio::test]
    async fn suggestions_follow_the_last_token() {
        let ctx = context_with_metar();
        let grammar = ctx.grammars().get("METAR", None).unwrap();

        let at_start = ctx.suggest_at_end(Some(&grammar), "").await;
        let texts: Vec<&str> = at_start.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["METAR", "SPECI"]);

        let after_type = ctx.suggest_at_end(Some(&grammar), "METAR").await;
        assert_eq!(after_type[0].text, "LFPG");
    }

    #[tokio::test]
    async fn message_types_offered_when_no_grammar_is_active() {
        let ctx = EngineContext::new();
        ctx.set_message_types(vec![MessageTypeConfig {
            name: "METAR".to_string(),
            identifier: "METAR".to_string(),
            ..Default::default()
        }]);

        let suggestions = ctx.suggest_at_end(None, "").await;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].text, "METAR");
    }
}
