//! Fuzzy string matching shared by history filtering and providers
//!
//! Wraps the skim matcher with an acceptance threshold so every caller
//! agrees on what counts as a match.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum score a fuzzy match must reach to be accepted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchPrecision {
    /// Accept any subsequence match
    None,
    Low,
    #[default]
    Regular,
}

impl SearchPrecision {
    pub fn threshold(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Low => 20,
            Self::Regular => 50,
        }
    }
}

/// Case-insensitive fuzzy matcher with a precision threshold
pub struct StringMatcher {
    matcher: SkimMatcherV2,
    precision: SearchPrecision,
}

impl StringMatcher {
    pub fn new(precision: SearchPrecision) -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
            precision,
        }
    }

    pub fn precision(&self) -> SearchPrecision {
        self.precision
    }

    /// Raw fuzzy score of `query` against `text`, if it matches at all
    pub fn fuzzy_score(&self, query: &str, text: &str) -> Option<i64> {
        let query = query.trim();
        if query.is_empty() || text.is_empty() {
            return None;
        }
        self.matcher.fuzzy_match(text, query)
    }

    /// Whether `query` matches `text` with at least the configured precision
    pub fn is_match(&self, query: &str, text: &str) -> bool {
        self.fuzzy_score(query, text)
            .map(|score| score >= self.precision.threshold())
            .unwrap_or(false)
    }
}

impl Default for StringMatcher {
    fn default() -> Self {
        Self::new(SearchPrecision::default())
    }
}

impl fmt::Debug for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringMatcher")
            .field("precision", &self.precision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_match_is_accepted() {
        let matcher = StringMatcher::default();
        assert!(matcher.is_match("git", "git status"));
        assert!(matcher.is_match("GIT", "git status"));
    }

    #[test]
    fn test_non_match_is_rejected() {
        let matcher = StringMatcher::default();
        assert!(!matcher.is_match("xyz", "git status"));
        assert!(!matcher.is_match("", "git status"));
    }

    #[test]
    fn test_precision_threshold() {
        assert!(SearchPrecision::None.threshold() < SearchPrecision::Low.threshold());
        assert!(SearchPrecision::Low.threshold() < SearchPrecision::Regular.threshold());

        let loose = StringMatcher::new(SearchPrecision::None);
        assert!(loose.is_match("g", "git status"));
        assert!(!loose.is_match("q", "git status"));
    }
}
