//! Suggestion engine: candidate derivation, providers, and caching.

pub mod cache;
pub mod engine;
pub mod provider;

pub use cache::{CachePolicy, SuggestionCache};
pub use engine::{FirRegion, MessageTypeConfig, SuggestionEngine};
pub use provider::{
    FetchOutcome, FetchState, ProviderConfig, ProviderRegistry, ProviderRequest,
    SuggestionProvider, SyncProvider,
};

use serde::Serialize;

use crate::grammar::EditableRange;

/// One entry of the suggestion list handed to the editor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Text inserted when the suggestion is applied.
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The token id this suggestion originates from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    /// Submenu entries; meaningful when `is_category` is set.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Suggestion>,
    pub is_category: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub editable: Vec<EditableRange>,
    /// Provider id to fetch from when the entry is opened or triggered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Applying this suggestion switches the editor to another grammar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switch_grammar: Option<String>,
    pub append_to_previous: bool,
    /// "Nothing to insert, advance to the next token."
    pub skip_to_next: bool,
    pub new_line_before: bool,
    /// Only applied automatically, never listed for manual selection.
    pub auto_only: bool,
}

impl Suggestion {
    pub fn value(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: None,
            token_id: None,
            children: Vec::new(),
            is_category: false,
            editable: Vec::new(),
            provider: None,
            switch_grammar: None,
            append_to_previous: false,
            skip_to_next: false,
            new_line_before: false,
            auto_only: false,
        }
    }

    pub fn category(text: impl Into<String>, children: Vec<Suggestion>) -> Self {
        let mut suggestion = Self::value(text);
        suggestion.is_category = true;
        suggestion.children = children;
        suggestion
    }

    pub fn skip() -> Self {
        let mut suggestion = Self::value("");
        suggestion.skip_to_next = true;
        suggestion
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_token_id(mut self, token_id: impl Into<String>) -> Self {
        self.token_id = Some(token_id.into());
        self
    }
}
