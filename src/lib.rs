//! Grammar-driven parsing and suggestion engine for TAC aviation weather
//! messages (METAR, SPECI, TAF, SIGMET, AIRMET, volcanic ash and tropical
//! cyclone advisories).
//!
//! Message types are described by JSON grammar documents: token patterns,
//! a structure declaring order and cardinality, and suggestion rules.
//! [`tokenizer::tokenize`] turns message text into typed, contiguous
//! spans; [`suggest::SuggestionEngine`] derives what may come next,
//! backed by asynchronous providers with timeouts and caching; and
//! [`context::EngineContext`] ties the registries together for a host
//! editor.

pub mod context;
pub mod dispatch;
pub mod error;
pub mod grammar;
pub mod logging;
pub mod structure;
pub mod suggest;
pub mod tokenizer;
pub mod validate;

pub use context::{EngineContext, MessageIssue, ValidationReport};
pub use error::EngineError;
pub use grammar::{CompiledGrammar, Grammar, GrammarRegistry};
pub use suggest::{Suggestion, SuggestionEngine};
pub use tokenizer::{Token, TokenKind};
pub use validate::{ValidationRequest, Validator, ValidatorRegistry};
