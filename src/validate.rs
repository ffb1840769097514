//! Semantic validators
//!
//! A validator performs beyond-syntax checks on a structurally valid token
//! (day-of-month in range, visibility step values, ...). Validators are
//! registered on an engine either under an exact name, referenced from a
//! token definition's `validator` field, or under a dispatch pattern routed
//! by [`crate::dispatch::DispatchPattern`].
//!
//! Validators are synchronous: tokenization must complete in a single pass
//! without suspending. A validator rejecting a token attaches an error
//! message; the token keeps its resolved type and span.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::dispatch::DispatchPattern;
use crate::error::EngineError;
use crate::grammar::CompiledGrammar;

/// Everything a validator may inspect about the token under test.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub token_value: &'a str,
    pub token_type: &'a str,
    /// The complete message text the token was found in.
    pub full_text: &'a str,
    /// Byte offset of the token within `full_text`.
    pub position: usize,
    pub grammar_name: Option<&'a str>,
    pub grammar_code: Option<&'a str>,
    pub grammar_standard: Option<&'a str>,
    pub grammar_lang: Option<&'a str>,
}

/// A semantic check. Returns `None` when the value is acceptable, or the
/// error message to attach to the token.
pub trait Validator: Send + Sync {
    fn validate(&self, request: &ValidationRequest<'_>) -> Option<String>;
}

impl<F> Validator for F
where
    F: Fn(&ValidationRequest<'_>) -> Option<String> + Send + Sync,
{
    fn validate(&self, request: &ValidationRequest<'_>) -> Option<String> {
        self(request)
    }
}

/// Per-engine validator registry.
#[derive(Default)]
pub struct ValidatorRegistry {
    named: DashMap<String, Arc<dyn Validator>>,
    patterns: RwLock<Vec<(DispatchPattern, Arc<dyn Validator>)>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a validator under an exact name.
    pub fn register_named(&self, name: impl Into<String>, validator: Arc<dyn Validator>) {
        self.named.insert(name.into(), validator);
    }

    /// Registers a validator under a `code.standard.lang.token-type`
    /// pattern. Earlier registrations win on overlap.
    pub fn register_pattern(
        &self,
        pattern: &str,
        validator: Arc<dyn Validator>,
    ) -> Result<(), EngineError> {
        let pattern: DispatchPattern = pattern.parse()?;
        self.patterns.write().push((pattern, validator));
        Ok(())
    }

    /// Runs the validator applicable to one token, if any.
    ///
    /// The token definition's named validator takes precedence; otherwise
    /// the first matching pattern registration is used.
    pub fn run(
        &self,
        grammar: &CompiledGrammar,
        token_type: &str,
        request: &ValidationRequest<'_>,
    ) -> Option<String> {
        if let Some(name) = grammar
            .token_def(token_type)
            .and_then(|def| def.validator.as_deref())
        {
            if let Some(validator) = self.named.get(name) {
                return validator.validate(request);
            }
        }

        let patterns = self.patterns.read();
        for (pattern, validator) in patterns.iter() {
            if pattern.matches(
                grammar.code(),
                grammar.standard(),
                grammar.lang(),
                Some(token_type),
            ) {
                return validator.validate(request);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(json: &str) -> CompiledGrammar {
        CompiledGrammar::compile(serde_json::from_str(json).unwrap())
    }

    fn request<'a>(value: &'a str, token_type: &'a str) -> ValidationRequest<'a> {
        ValidationRequest {
            token_value: value,
            token_type,
            full_text: value,
            position: 0,
            grammar_name: None,
            grammar_code: None,
            grammar_standard: None,
            grammar_lang: None,
        }
    }

    fn day_range_validator(request: &ValidationRequest<'_>) -> Option<String> {
        let day: u32 = request.token_value.get(0..2)?.parse().ok()?;
        (day == 0 || day > 31).then(|| format!("day {day} is out of range 01-31"))
    }

    #[test]
    fn named_validator_takes_precedence() {
        let g = grammar(
            r#"{"code": "sa", "tokens": {"datetime": {"pattern": "[0-9]{6}Z", "validator": "dayRange"}}}"#,
        );
        let registry = ValidatorRegistry::new();
        registry.register_named("dayRange", Arc::new(day_range_validator));
        registry
            .register_pattern("*.*.*.datetime", Arc::new(|_: &ValidationRequest<'_>| {
                Some("pattern validator should not run".to_string())
            }))
            .unwrap();

        let err = registry.run(&g, "datetime", &request("320000Z", "datetime"));
        assert_eq!(err.as_deref(), Some("day 32 is out of range 01-31"));

        let ok = registry.run(&g, "datetime", &request("250000Z", "datetime"));
        assert!(ok.is_none());
    }

    #[test]
    fn pattern_validator_routes_by_grammar_identity() {
        let sa = grammar(r#"{"code": "sa", "tokens": {"datetime": {}}}"#);
        let ft = grammar(r#"{"code": "ft", "tokens": {"datetime": {}}}"#);

        let registry = ValidatorRegistry::new();
        registry
            .register_pattern("sa.*.*.datetime", Arc::new(day_range_validator))
            .unwrap();

        assert!(registry
            .run(&sa, "datetime", &request("320000Z", "datetime"))
            .is_some());
        assert!(registry
            .run(&ft, "datetime", &request("320000Z", "datetime"))
            .is_none());
    }

    #[test]
    fn no_registration_means_valid() {
        let g = grammar(r#"{"tokens": {"wind": {}}}"#);
        let registry = ValidatorRegistry::new();
        assert!(registry.run(&g, "wind", &request("27010KT", "wind")).is_none());
    }
}
