//! Suggestion providers
//!
//! A provider supplies dynamic suggestion values the grammar cannot declare
//! statically: live station codes, FIR boundaries, current observation data.
//! Providers are registered per engine, by id (referenced from a token
//! definition's `provider` field) or by dispatch pattern, and are uniformly
//! asynchronous — synchronous sources are wrapped in [`SyncProvider`] so the
//! timeout and cancellation plumbing stays identical for every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::cache::CachePolicy;
use super::Suggestion;
use crate::dispatch::DispatchPattern;
use crate::error::EngineError;
use crate::grammar::{CompiledGrammar, SuggestionItem};

/// Default budget for a provider call before the grace window starts.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Context handed to a provider call.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub token_type: Option<String>,
    /// Partial text the user has typed for the token, for server-side
    /// filtering.
    pub search: Option<String>,
    /// The full message text.
    pub tac: String,
    pub cursor_position: usize,
    pub grammar_name: Option<String>,
    pub grammar_code: Option<String>,
    pub grammar_standard: Option<String>,
    pub grammar_lang: Option<String>,
}

/// An asynchronous suggestion source.
///
/// Returning `None` means "nothing to contribute"; it is not an error. A
/// provider should poll `cancel` across its own await points and bail out
/// early when the token fires.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn fetch(
        &self,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> Option<Vec<SuggestionItem>>;
}

/// Adapter wrapping a synchronous callback as a provider.
pub struct SyncProvider<F>(pub F);

#[async_trait]
impl<F> SuggestionProvider for SyncProvider<F>
where
    F: Fn(&ProviderRequest) -> Option<Vec<SuggestionItem>> + Send + Sync,
{
    async fn fetch(
        &self,
        request: ProviderRequest,
        _cancel: CancellationToken,
    ) -> Option<Vec<SuggestionItem>> {
        (self.0)(&request)
    }
}

/// Per-registration behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct ProviderConfig {
    /// Provider results replace the grammar's static items (true) or are
    /// appended after them (false).
    pub replace: bool,
    /// Cache policy for successful results; `None` disables caching.
    pub cache: Option<CachePolicy>,
    pub timeout: Duration,
    /// Defer the fetch into a submenu category instead of inline.
    pub category: bool,
    /// The provider blocks on user interaction: no timeout applies and the
    /// host is expected to show a blocking affordance.
    pub user_interaction: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            replace: true,
            cache: None,
            timeout: DEFAULT_TIMEOUT,
            category: false,
            user_interaction: false,
        }
    }
}

/// One registered provider.
#[derive(Clone)]
pub struct ProviderEntry {
    pub id: String,
    /// Present for pattern registrations; used to build scoped cache keys.
    pub pattern: Option<DispatchPattern>,
    pub provider: Arc<dyn SuggestionProvider>,
    pub config: ProviderConfig,
}

impl ProviderEntry {
    /// Cache key for a concrete token type: the pattern's first three
    /// segments when registered by pattern, the grammar's identity
    /// otherwise.
    pub fn cache_key(&self, grammar: Option<&CompiledGrammar>, token_type: &str) -> String {
        match &self.pattern {
            Some(pattern) => pattern.cache_key(token_type),
            None => {
                let seg = |v: Option<&str>| v.unwrap_or("*").to_string();
                format!(
                    "{}.{}.{}.{}",
                    seg(grammar.and_then(|g| g.code())),
                    seg(grammar.and_then(|g| g.standard())),
                    seg(grammar.and_then(|g| g.lang())),
                    token_type
                )
            }
        }
    }
}

/// Per-engine provider registry.
#[derive(Default)]
pub struct ProviderRegistry {
    named: DashMap<String, ProviderEntry>,
    patterns: RwLock<Vec<ProviderEntry>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_named(
        &self,
        id: impl Into<String>,
        provider: Arc<dyn SuggestionProvider>,
        config: ProviderConfig,
    ) {
        let id = id.into();
        self.named.insert(
            id.clone(),
            ProviderEntry {
                id,
                pattern: None,
                provider,
                config,
            },
        );
    }

    pub fn register_pattern(
        &self,
        pattern: &str,
        provider: Arc<dyn SuggestionProvider>,
        config: ProviderConfig,
    ) -> Result<(), EngineError> {
        let parsed: DispatchPattern = pattern.parse()?;
        self.patterns.write().push(ProviderEntry {
            id: pattern.to_string(),
            pattern: Some(parsed),
            provider,
            config,
        });
        Ok(())
    }

    pub fn get_named(&self, id: &str) -> Option<ProviderEntry> {
        self.named.get(id).map(|e| e.clone())
    }

    /// Looks a registration up by id, named or pattern. Fetch triggers carry
    /// the id the deferred suggestion was tagged with.
    pub fn get_by_id(&self, id: &str) -> Option<ProviderEntry> {
        self.get_named(id)
            .or_else(|| self.patterns.read().iter().find(|e| e.id == id).cloned())
    }

    /// Resolves the provider responsible for one token, if any.
    ///
    /// Resolution order: the token definition's named provider, then
    /// pattern registrations against the token type, then pattern
    /// registrations against the token's declared category — the category
    /// fallback lets one broad provider (`*.*.*.measurement`) cover many
    /// token types.
    pub fn lookup(&self, grammar: &CompiledGrammar, token_type: &str) -> Option<ProviderEntry> {
        let def = grammar.token_def(token_type);

        if let Some(id) = def.and_then(|d| d.provider.as_deref()) {
            if let Some(entry) = self.get_named(id) {
                return Some(entry);
            }
        }

        let patterns = self.patterns.read();
        let find = |ty: &str| {
            patterns
                .iter()
                .find(|entry| {
                    entry
                        .pattern
                        .as_ref()
                        .is_some_and(|p| {
                            p.matches(grammar.code(), grammar.standard(), grammar.lang(), Some(ty))
                        })
                })
                .cloned()
        };

        find(token_type).or_else(|| def.and_then(|d| d.category.as_deref()).and_then(find))
    }
}

/// Editor-facing lifecycle of one provider fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Idle,
    Loading,
    Resolved,
    TimedOut,
    Cancelled,
}

/// Result of [`crate::suggest::SuggestionEngine::fetch_suggestions`].
#[derive(Debug)]
pub enum FetchOutcome {
    /// Provider answered within budget (or from cache).
    Resolved(Vec<Suggestion>),
    /// Budget and grace window elapsed. The placeholder should be shown;
    /// `late` eventually yields the real result if the provider finishes,
    /// and the cache is updated either way.
    TimedOut {
        placeholder: Suggestion,
        late: oneshot::Receiver<Vec<Suggestion>>,
    },
    /// The caller cancelled; the token's static placeholder, if any.
    Cancelled(Option<Suggestion>),
    /// A request for this provider id is already running.
    AlreadyInFlight,
    /// No provider is registered under the requested id.
    Unregistered,
}

impl FetchOutcome {
    pub fn state(&self) -> FetchState {
        match self {
            FetchOutcome::Resolved(_) => FetchState::Resolved,
            FetchOutcome::TimedOut { .. } => FetchState::TimedOut,
            FetchOutcome::Cancelled(_) => FetchState::Cancelled,
            FetchOutcome::AlreadyInFlight => FetchState::Loading,
            FetchOutcome::Unregistered => FetchState::Idle,
        }
    }
}
