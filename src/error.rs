//! Error taxonomy for the engine
//!
//! Recoverable conditions (unmatched words, failed semantic checks, provider
//! timeouts) are represented as data on tokens and suggestions, never as
//! `Err` values. The variants here cover caller-facing failures only:
//! malformed grammar documents, missing registrations, and bad dispatch
//! patterns.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A grammar file could not be read from disk.
    #[error("failed to read grammar file {path}: {source}")]
    GrammarRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A grammar document failed JSON deserialization.
    #[error("malformed grammar document: {0}")]
    GrammarParse(#[from] serde_json::Error),

    /// No grammar is registered under the requested (name, standard) key.
    #[error("no grammar registered for \"{name}\" (standard: {standard})")]
    UnknownGrammar { name: String, standard: String },

    /// A dispatch pattern string did not have exactly four segments.
    #[error("invalid dispatch pattern \"{0}\": expected code.standard.lang.token-type")]
    InvalidPattern(String),
}
