//! Query history with FIFO eviction

use crate::matcher::StringMatcher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of history entries kept
pub const DEFAULT_MAX_HISTORY: usize = 300;

/// A previously executed query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    pub executed_at: DateTime<Utc>,
}

/// Bounded list of executed queries, oldest first
#[derive(Debug, Clone)]
pub struct QueryHistory {
    items: VecDeque<HistoryEntry>,
    max_items: usize,
}

impl QueryHistory {
    pub fn new(max_items: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_items,
        }
    }

    /// Rebuild history from persisted entries, keeping the newest `max_items`
    pub fn from_entries(entries: Vec<HistoryEntry>, max_items: usize) -> Self {
        let mut history = Self {
            items: entries.into(),
            max_items,
        };
        history.evict();
        history
    }

    /// Record a query executed now
    pub fn record_query(&mut self, query: &str) {
        self.record_query_at(query, Utc::now());
    }

    /// Record a query with an explicit timestamp.
    ///
    /// Repeating the most recent query refreshes its timestamp instead of
    /// adding a duplicate entry.
    pub fn record_query_at(&mut self, query: &str, at: DateTime<Utc>) {
        if query.is_empty() {
            return;
        }

        match self.items.back_mut() {
            Some(last) if last.query == query => last.executed_at = at,
            _ => {
                self.items.push_back(HistoryEntry {
                    query: query.to_string(),
                    executed_at: at,
                });
                self.evict();
            }
        }
    }

    /// Entries matching `filter`, or every entry when the filter is empty
    pub fn query_history(&self, filter: &str, matcher: &StringMatcher) -> Vec<HistoryEntry> {
        let filter = filter.trim();
        self.items
            .iter()
            .filter(|entry| filter.is_empty() || matcher.is_match(filter, &entry.query))
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.items.iter().cloned().collect()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.items.back()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    fn evict(&mut self) {
        while self.items.len() > self.max_items {
            self.items.pop_front();
        }
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_eviction_drops_oldest() {
        let mut history = QueryHistory::new(3);
        for query in ["one", "two", "three", "four"] {
            history.record_query(query);
        }

        assert_eq!(history.len(), 3);
        let queries: Vec<_> = history.entries().into_iter().map(|e| e.query).collect();
        assert_eq!(queries, vec!["two", "three", "four"]);
    }

    #[test]
    fn test_repeat_refreshes_timestamp() {
        let mut history = QueryHistory::default();
        let earlier = Utc::now() - Duration::minutes(5);
        let later = Utc::now();

        history.record_query_at("cat", earlier);
        history.record_query_at("cat", later);

        assert_eq!(history.len(), 1);
        assert_eq!(history.last().unwrap().executed_at, later);
    }

    #[test]
    fn test_non_consecutive_repeat_is_appended() {
        let mut history = QueryHistory::default();
        history.record_query("cat");
        history.record_query("dog");
        history.record_query("cat");

        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_empty_query_ignored() {
        let mut history = QueryHistory::default();
        history.record_query("");
        assert!(history.is_empty());
    }

    #[test]
    fn test_filter() {
        let mut history = QueryHistory::default();
        history.record_query("git status");
        history.record_query("notepad");
        history.record_query("git commit");

        let matcher = StringMatcher::default();
        let all = history.query_history("", &matcher);
        assert_eq!(all.len(), 3);

        let filtered = history.query_history("git", &matcher);
        let queries: Vec<_> = filtered.iter().map(|e| e.query.as_str()).collect();
        assert_eq!(queries, vec!["git status", "git commit"]);
    }

    #[test]
    fn test_from_entries_applies_cap() {
        let entries = (0..5)
            .map(|i| HistoryEntry {
                query: format!("q{}", i),
                executed_at: Utc::now(),
            })
            .collect();

        let history = QueryHistory::from_entries(entries, 2);
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().query, "q4");
    }
}
