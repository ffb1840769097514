//! Suggestion derivation and the asynchronous provider pipeline
//!
//! Candidates come from the grammar's `suggestions.after` map: the token
//! type just completed (or `"start"`) yields the token ids legal next. For
//! each id the engine either emits a deferred provider placeholder — the
//! provider is only called when the caller explicitly triggers a fetch — or
//! expands the grammar's static items inline.
//!
//! Provider fetches race a timeout, get a short grace window for a late
//! answer, and continue in the background after the grace window so a slow
//! result still lands in the cache and reaches the caller through a late
//! channel. Results are applied by provider id, never by list index, so an
//! answer arriving after the user kept typing is dropped harmlessly. At
//! most one call per provider id is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashSet;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cache::SuggestionCache;
use super::provider::{FetchOutcome, ProviderRegistry, ProviderRequest};
use super::Suggestion;
use crate::grammar::{CompiledGrammar, Placeholder, SuggestionItem};

/// Extra time a provider gets after its timeout before the placeholder is
/// surfaced.
const GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Dynamic value expanded to the current UTC time rounded up to the next
/// five minutes, in `DDHHMMZ`.
const DATETIME_VALUE: &str = "<datetime>";

/// A message type offered when no grammar is active yet.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageTypeConfig {
    pub name: String,
    /// Identifier word(s) starting a message of this type.
    pub identifier: String,
    pub description: Option<String>,
    /// For SIGMET/AIRMET-style types whose identifier is the second word,
    /// the FIR entries offered as first words.
    pub firs: Vec<FirRegion>,
}

/// One flight information region entry.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirRegion {
    pub code: String,
    pub description: Option<String>,
}

/// The suggestion half of an engine: provider registry, result cache, and
/// in-flight bookkeeping.
pub struct SuggestionEngine {
    providers: ProviderRegistry,
    cache: Arc<SuggestionCache>,
    in_flight: Arc<DashSet<String>>,
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionEngine {
    pub fn new() -> Self {
        Self {
            providers: ProviderRegistry::new(),
            cache: Arc::new(SuggestionCache::new()),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn cache(&self) -> &SuggestionCache {
        &self.cache
    }

    /// Derives the suggestion list for the current position.
    ///
    /// `token_type` is the type of the token before the cursor, or `None`
    /// at the start of the message. With no active grammar the configured
    /// message types are offered instead.
    pub fn suggestions_for(
        &self,
        grammar: Option<&CompiledGrammar>,
        token_type: Option<&str>,
        prev_token_text: Option<&str>,
        message_types: &[MessageTypeConfig],
    ) -> Vec<Suggestion> {
        let Some(grammar) = grammar else {
            return message_type_suggestions(message_types);
        };

        let after_key = token_type.unwrap_or("start");
        let Some(next_ids) = grammar.grammar.suggestions.after.get(after_key) else {
            return Vec::new();
        };

        let now = Utc::now();
        let mut out = Vec::new();
        for id in next_ids {
            let def = grammar.token_def(id);

            if let Some(entry) = self.providers.lookup(grammar, id) {
                // Deferred: the provider is not called until the category is
                // opened or the caller triggers a fetch.
                let text = def
                    .and_then(|d| d.placeholder.as_ref())
                    .map(|p| p.text.clone())
                    .unwrap_or_else(|| id.clone());
                let mut suggestion = if entry.config.category {
                    Suggestion::category(text, Vec::new())
                } else {
                    Suggestion::value(text)
                };
                suggestion.provider = Some(entry.id.clone());
                suggestion.token_id = Some(id.clone());
                suggestion.description = def.and_then(|d| d.description.clone());
                out.push(suggestion);
                continue;
            }

            match grammar.grammar.suggestions.items.get(id) {
                Some(items) => {
                    out.extend(
                        items
                            .iter()
                            .filter_map(|item| expand_item(item, id, prev_token_text, now)),
                    );
                }
                None => {
                    if let Some(placeholder) = def.and_then(|d| d.placeholder.as_ref()) {
                        out.push(placeholder_suggestion(placeholder, id));
                    }
                }
            }
        }
        out
    }

    /// Runs one provider fetch with timeout racing, caching, and in-flight
    /// deduplication. See [`FetchOutcome`] for the possible endings.
    pub async fn fetch_suggestions(
        &self,
        provider_id: &str,
        grammar: Option<&CompiledGrammar>,
        request: ProviderRequest,
        cancel: CancellationToken,
    ) -> FetchOutcome {
        let Some(entry) = self.providers.get_by_id(provider_id) else {
            debug!(provider = %provider_id, "fetch for unregistered provider");
            return FetchOutcome::Unregistered;
        };

        let token_type = request.token_type.clone().unwrap_or_else(|| "*".to_string());
        let cache_key = entry.cache_key(grammar, &token_type);
        let now = Utc::now();

        if entry.config.cache.is_some() {
            if let Some(items) = self.cache.get(&cache_key, now) {
                debug!(provider = %provider_id, key = %cache_key, "suggestion cache hit");
                return FetchOutcome::Resolved(items);
            }
        }

        if !self.in_flight.insert(provider_id.to_string()) {
            debug!(provider = %provider_id, "request already in flight");
            return FetchOutcome::AlreadyInFlight;
        }
        // Removed on every path below; the timed-out path hands removal to
        // the background watcher.
        let guard = scopeguard::guard((), |_| {
            self.in_flight.remove(provider_id);
        });

        // Static grammar items for augment-mode merging and fallbacks
        let static_items: Vec<Suggestion> = grammar
            .and_then(|g| g.grammar.suggestions.items.get(&token_type))
            .map(|items| expand_provider_items(items, Some(&token_type)))
            .unwrap_or_default();
        let static_placeholder = grammar
            .and_then(|g| g.token_def(&token_type))
            .and_then(|d| d.placeholder.as_ref())
            .map(|p| placeholder_suggestion(p, &token_type));

        let provider = entry.provider.clone();
        let provider_cancel = cancel.clone();
        let mut task =
            tokio::spawn(async move { provider.fetch(request, provider_cancel).await });

        enum RaceEnd {
            Done(Result<Option<Vec<SuggestionItem>>, tokio::task::JoinError>),
            Cancelled,
            TimedOut,
        }

        let end = if entry.config.user_interaction {
            // User-interaction providers have no deadline
            tokio::select! {
                res = &mut task => RaceEnd::Done(res),
                _ = cancel.cancelled() => RaceEnd::Cancelled,
            }
        } else {
            tokio::select! {
                res = &mut task => RaceEnd::Done(res),
                _ = cancel.cancelled() => RaceEnd::Cancelled,
                _ = tokio::time::sleep(entry.config.timeout) => {
                    tokio::select! {
                        res = &mut task => RaceEnd::Done(res),
                        _ = cancel.cancelled() => RaceEnd::Cancelled,
                        _ = tokio::time::sleep(GRACE_PERIOD) => RaceEnd::TimedOut,
                    }
                }
            }
        };

        match end {
            RaceEnd::Done(Ok(Some(items))) => {
                let mut suggestions = if entry.config.replace {
                    Vec::new()
                } else {
                    static_items
                };
                suggestions.extend(expand_provider_items(&items, Some(&token_type)));
                for suggestion in &mut suggestions {
                    suggestion.provider.get_or_insert_with(|| entry.id.clone());
                }
                if let Some(policy) = entry.config.cache {
                    self.cache
                        .insert(cache_key, suggestions.clone(), policy, Utc::now());
                }
                FetchOutcome::Resolved(suggestions)
            }
            RaceEnd::Done(Ok(None)) => {
                // Nothing to contribute; fall back to the grammar's items
                FetchOutcome::Resolved(static_items)
            }
            RaceEnd::Done(Err(err)) => {
                warn!(provider = %provider_id, %err, "provider task failed");
                FetchOutcome::Resolved(static_items)
            }
            RaceEnd::Cancelled => {
                task.abort();
                FetchOutcome::Cancelled(static_placeholder)
            }
            RaceEnd::TimedOut => {
                // Defuse the guard: the watcher owns the in-flight slot now
                scopeguard::ScopeGuard::into_inner(guard);
                let (tx, rx) = oneshot::channel();
                let cache = Arc::clone(&self.cache);
                let in_flight = Arc::clone(&self.in_flight);
                let id = entry.id.clone();
                let policy = entry.config.cache;
                let late_token_type = token_type.clone();
                tokio::spawn(async move {
                    if let Ok(Some(items)) = task.await {
                        let mut suggestions =
                            expand_provider_items(&items, Some(&late_token_type));
                        for suggestion in &mut suggestions {
                            suggestion.provider.get_or_insert_with(|| id.clone());
                        }
                        if let Some(policy) = policy {
                            cache.insert(cache_key, suggestions.clone(), policy, Utc::now());
                        }
                        let _ = tx.send(suggestions);
                    }
                    in_flight.remove(&id);
                });

                let mut placeholder = static_placeholder
                    .unwrap_or_else(|| Suggestion::value("").with_token_id(&token_type));
                placeholder.description = Some("Loading expired".to_string());
                placeholder.provider = Some(entry.id.clone());
                return FetchOutcome::TimedOut {
                    placeholder,
                    late: rx,
                };
            }
        }
    }
}

/// Suggestions offered before any grammar is active: one entry per message
/// type, FIR-style types as a category of region entries.
fn message_type_suggestions(types: &[MessageTypeConfig]) -> Vec<Suggestion> {
    types
        .iter()
        .map(|ty| {
            if ty.firs.is_empty() {
                let mut s = Suggestion::value(&ty.identifier);
                s.description = ty.description.clone();
                s
            } else {
                let children = ty
                    .firs
                    .iter()
                    .map(|fir| {
                        let mut s = Suggestion::value(format!("{} {}", fir.code, ty.identifier));
                        s.description = fir.description.clone();
                        s
                    })
                    .collect();
                let mut s = Suggestion::category(&ty.identifier, children);
                s.description = ty.description.clone();
                s
            }
        })
        .collect()
}

/// Expands one declared item. Returns `None` for items filtered out, such
/// as an append-to-previous qualifier the previous token already ends with
/// (no point re-offering "CB" on "SCT040CB").
fn expand_item(
    item: &SuggestionItem,
    token_id: &str,
    prev_token_text: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Suggestion> {
    match item {
        SuggestionItem::Value(value) => {
            if value.append_to_previous
                && !value.text.is_empty()
                && prev_token_text.is_some_and(|prev| prev.ends_with(value.text.as_str()))
            {
                return None;
            }
            let text = if value.text == DATETIME_VALUE {
                rounded_datetime(now)
            } else {
                value.text.clone()
            };
            let mut s = Suggestion::value(text).with_token_id(token_id);
            s.description = value.description.clone();
            s.editable = value.editable.clone();
            s.new_line_before = value.new_line_before;
            s.auto_only = value.auto;
            s.append_to_previous = value.append_to_previous;
            Some(s)
        }
        SuggestionItem::Skip => Some(Suggestion::skip().with_token_id(token_id)),
        SuggestionItem::Category {
            text,
            description,
            children,
        } => {
            let children = children
                .iter()
                .filter_map(|child| expand_item(child, token_id, prev_token_text, now))
                .collect();
            let mut s = Suggestion::category(text.clone(), children).with_token_id(token_id);
            s.description = description.clone();
            Some(s)
        }
        SuggestionItem::SwitchGrammar { text, target } => {
            let mut s = Suggestion::value(text.clone()).with_token_id(token_id);
            s.switch_grammar = Some(target.clone());
            Some(s)
        }
    }
}

/// Expands provider-returned items. No previous-token filtering applies:
/// the provider already saw the full context.
pub(crate) fn expand_provider_items(
    items: &[SuggestionItem],
    token_id: Option<&str>,
) -> Vec<Suggestion> {
    let now = Utc::now();
    items
        .iter()
        .filter_map(|item| expand_item(item, token_id.unwrap_or(""), None, now))
        .collect()
}

fn placeholder_suggestion(placeholder: &Placeholder, token_id: &str) -> Suggestion {
    let mut s = Suggestion::value(placeholder.text.clone()).with_token_id(token_id);
    s.editable = placeholder.editable.clone();
    s
}

/// Current UTC time rounded up to the next five-minute step, as `DDHHMMZ`.
fn rounded_datetime(now: DateTime<Utc>) -> String {
    let remainder = now.minute() % 5;
    let rounded = if remainder == 0 && now.second() == 0 {
        now
    } else {
        now + chrono::TimeDelta::minutes((5 - remainder) as i64)
    };
    format!("{}Z", rounded.format("%d%H%M"))
}
