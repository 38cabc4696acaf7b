//! Per-result selection counters and pinned results

use crate::results::ResultIdentity;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

/// Persisted form of one usage counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(flatten)]
    pub identity: ResultIdentity,
    pub count: u32,
}

/// How often each result has been selected
#[derive(Debug, Default)]
pub struct UserSelectedRecord {
    records: RwLock<HashMap<ResultIdentity, u32>>,
}

impl UserSelectedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<UsageRecord>) -> Self {
        let mut map = HashMap::with_capacity(records.len());
        for record in records {
            let count = map.entry(record.identity).or_insert(0u32);
            *count = count.saturating_add(record.count);
        }
        Self {
            records: RwLock::new(map),
        }
    }

    /// Increment the counter for `identity` by one
    pub fn record_selection(&self, identity: ResultIdentity) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let count = records.entry(identity).or_insert(0);
        *count = count.saturating_add(1);
    }

    pub fn selection_count(&self, identity: &ResultIdentity) -> u32 {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .copied()
            .unwrap_or(0)
    }

    /// Snapshot of all counters, sorted by identity
    pub fn to_records(&self) -> Vec<UsageRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<UsageRecord> = records
            .iter()
            .map(|(identity, &count)| UsageRecord {
                identity: identity.clone(),
                count,
            })
            .collect();
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Results pinned to the top of the list
#[derive(Debug, Default)]
pub struct TopMostRecord {
    pinned: RwLock<HashSet<ResultIdentity>>,
}

impl TopMostRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_identities(identities: Vec<ResultIdentity>) -> Self {
        Self {
            pinned: RwLock::new(identities.into_iter().collect()),
        }
    }

    pub fn pin(&self, identity: ResultIdentity) {
        self.pinned
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity);
    }

    pub fn unpin(&self, identity: &ResultIdentity) -> bool {
        self.pinned
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity)
    }

    pub fn is_pinned(&self, identity: &ResultIdentity) -> bool {
        self.pinned
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(identity)
    }

    pub fn to_identities(&self) -> Vec<ResultIdentity> {
        let pinned = self.pinned.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<_> = pinned.iter().cloned().collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat() -> ResultIdentity {
        ResultIdentity::new("b", "Cat1", "")
    }

    #[test]
    fn test_record_selection_increments_by_one() {
        let usage = UserSelectedRecord::new();
        assert_eq!(usage.selection_count(&cat()), 0);

        usage.record_selection(cat());
        assert_eq!(usage.selection_count(&cat()), 1);

        usage.record_selection(cat());
        assert_eq!(usage.selection_count(&cat()), 2);
    }

    #[test]
    fn test_records_roundtrip_through_snapshot() {
        let usage = UserSelectedRecord::new();
        usage.record_selection(cat());
        usage.record_selection(cat());

        let restored = UserSelectedRecord::from_records(usage.to_records());
        assert_eq!(restored.selection_count(&cat()), 2);
    }

    #[test]
    fn test_concurrent_increments() {
        let usage = std::sync::Arc::new(UserSelectedRecord::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let usage = usage.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        usage.record_selection(cat());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(usage.selection_count(&cat()), 800);
    }

    #[test]
    fn test_pin_unpin() {
        let top_most = TopMostRecord::new();
        top_most.pin(cat());
        assert!(top_most.is_pinned(&cat()));

        assert!(top_most.unpin(&cat()));
        assert!(!top_most.is_pinned(&cat()));
        assert!(!top_most.unpin(&cat()));
    }
}
