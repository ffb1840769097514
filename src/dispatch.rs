//! Pattern dispatch
//!
//! Validators and suggestion providers can be registered against a 4-segment
//! wildcard key `code.standard.lang.token-type` (for example
//! `sa.*.*.temperature` or `*.*.*.measurement`) instead of an exact name.
//! Each segment is either a literal or `*`. A `None` value on the lookup
//! side matches `*` only — an unidentified grammar never satisfies a literal
//! segment.

use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Any,
    Literal(String),
}

impl Segment {
    fn matches(&self, value: Option<&str>) -> bool {
        match self {
            Segment::Any => true,
            Segment::Literal(lit) => value == Some(lit.as_str()),
        }
    }
}

/// A parsed `code.standard.lang.token-type` dispatch pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPattern {
    segments: [Segment; 4],
}

impl DispatchPattern {
    /// True iff every segment is `*` or equals the corresponding value.
    pub fn matches(
        &self,
        code: Option<&str>,
        standard: Option<&str>,
        lang: Option<&str>,
        token_type: Option<&str>,
    ) -> bool {
        self.segments[0].matches(code)
            && self.segments[1].matches(standard)
            && self.segments[2].matches(lang)
            && self.segments[3].matches(token_type)
    }

    /// Cache key scoped to this pattern's first three segments plus the
    /// concrete token type, so a broad pattern still yields per-token-type
    /// cache entries.
    pub fn cache_key(&self, token_type: &str) -> String {
        let seg = |s: &Segment| match s {
            Segment::Any => "*".to_string(),
            Segment::Literal(lit) => lit.clone(),
        };
        format!(
            "{}.{}.{}.{}",
            seg(&self.segments[0]),
            seg(&self.segments[1]),
            seg(&self.segments[2]),
            token_type
        )
    }
}

impl FromStr for DispatchPattern {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [code, standard, lang, token_type] = parts.as_slice() else {
            return Err(EngineError::InvalidPattern(s.to_string()));
        };
        if [code, standard, lang, token_type]
            .iter()
            .any(|p| p.is_empty())
        {
            return Err(EngineError::InvalidPattern(s.to_string()));
        }
        let segment = |p: &str| {
            if p == "*" {
                Segment::Any
            } else {
                Segment::Literal(p.to_string())
            }
        };
        Ok(Self {
            segments: [
                segment(code),
                segment(standard),
                segment(lang),
                segment(token_type),
            ],
        })
    }
}

impl fmt::Display for DispatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match seg {
                Segment::Any => f.write_str("*")?,
                Segment::Literal(lit) => f.write_str(lit)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> DispatchPattern {
        s.parse().unwrap()
    }

    #[test]
    fn literal_segments_require_equality() {
        let p = pattern("sa.wmo.en.datetime");
        assert!(p.matches(Some("sa"), Some("wmo"), Some("en"), Some("datetime")));
        assert!(!p.matches(Some("ft"), Some("wmo"), Some("en"), Some("datetime")));
        assert!(!p.matches(Some("sa"), Some("wmo"), Some("en"), Some("wind")));
    }

    #[test]
    fn wildcards_match_anything_including_none() {
        let p = pattern("*.*.*.datetime");
        assert!(p.matches(None, None, None, Some("datetime")));
        assert!(p.matches(Some("sa"), Some("faa"), Some("fr"), Some("datetime")));
        assert!(!p.matches(None, None, None, Some("wind")));
    }

    #[test]
    fn none_never_matches_a_literal_segment() {
        let p = pattern("sa.*.*.datetime");
        assert!(!p.matches(None, None, None, Some("datetime")));
    }

    #[test]
    fn malformed_patterns_are_rejected() {
        assert!("sa.wmo.en".parse::<DispatchPattern>().is_err());
        assert!("a.b.c.d.e".parse::<DispatchPattern>().is_err());
        assert!("a..c.d".parse::<DispatchPattern>().is_err());
    }

    #[test]
    fn cache_key_scopes_broad_patterns_to_concrete_type() {
        let p = pattern("sa.*.*.measurement");
        assert_eq!(p.cache_key("temperature"), "sa.*.*.temperature");
    }

    #[test]
    fn display_round_trips() {
        let p = pattern("sa.*.en.wind");
        assert_eq!(p.to_string(), "sa.*.en.wind");
    }
}
