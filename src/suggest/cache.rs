//! Suggestion cache
//!
//! Provider results are cached under a key derived from the matched dispatch
//! pattern's first three segments plus the concrete token type, so one broad
//! registration still caches per token type. Entries carry an absolute
//! expiration instant and are evicted lazily on read.
//!
//! TTL policies include alignment to the next minute/hour/day boundary:
//! aerodrome data keyed to an observation cycle goes stale at the top of the
//! hour no matter when it was fetched, so an entry requested at minute 59
//! expires one minute later, not sixty.

use chrono::{DateTime, Days, DurationRound, TimeDelta, Utc};
use dashmap::DashMap;
use tracing::trace;

use super::Suggestion;

/// When a cached provider result stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Never expires (static reference data).
    Indefinite,
    /// Expires a fixed number of milliseconds after insertion.
    Millis(u64),
    /// Expires at the next minute boundary.
    Minute,
    /// Expires at the next hour boundary.
    Hour,
    /// Expires at the next UTC midnight.
    Day,
}

impl CachePolicy {
    /// Absolute expiration instant for an entry inserted at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            CachePolicy::Indefinite => None,
            CachePolicy::Millis(ms) => Some(now + TimeDelta::milliseconds(*ms as i64)),
            CachePolicy::Minute => Some(next_boundary(now, TimeDelta::minutes(1))),
            CachePolicy::Hour => Some(next_boundary(now, TimeDelta::hours(1))),
            CachePolicy::Day => {
                let midnight = now
                    .date_naive()
                    .checked_add_days(Days::new(1))
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc());
                midnight.or_else(|| Some(now + TimeDelta::days(1)))
            }
        }
    }
}

fn next_boundary(now: DateTime<Utc>, step: TimeDelta) -> DateTime<Utc> {
    match now.duration_trunc(step) {
        Ok(truncated) => truncated + step,
        Err(_) => now + step,
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    items: Vec<Suggestion>,
    expires_at: Option<DateTime<Utc>>,
}

/// Per-engine suggestion cache. Last writer wins; entries are idempotent
/// snapshots keyed by deterministic pattern + token-type strings.
#[derive(Debug, Default)]
pub struct SuggestionCache {
    entries: DashMap<String, CacheEntry>,
}

impl SuggestionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached items under `key`, purging the entry if it has
    /// expired.
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<Suggestion>> {
        let expired = match self.entries.get(key) {
            None => return None,
            Some(entry) => match entry.expires_at {
                Some(expires_at) if now >= expires_at => true,
                _ => return Some(entry.items.clone()),
            },
        };
        if expired {
            trace!(%key, "evicting expired suggestion cache entry");
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(
        &self,
        key: impl Into<String>,
        items: Vec<Suggestion>,
        policy: CachePolicy,
        now: DateTime<Utc>,
    ) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                items,
                expires_at: policy.expires_at(now),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
