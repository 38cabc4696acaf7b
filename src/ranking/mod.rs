//! Ranking engine
//!
//! Turns a merged result set plus usage and pin data into the ordered list
//! shown to the user. Pure: the same inputs always give the same order.

use crate::results::{RankedResult, ResultItem};
use crate::storage::{TopMostRecord, UserSelectedRecord};
use std::sync::Arc;

/// Score bonus per past selection of a result
pub const USAGE_WEIGHT: i64 = 5;

/// Score assigned to pinned results
pub const PINNED_SCORE: i64 = i64::MAX;

/// Rank `items` by adjusted score, highest first.
///
/// The sort is stable, so equal scores keep the order the items were given
/// in. Pinned results share [`PINNED_SCORE`] and therefore keep their
/// relative input order too.
pub fn rank(
    items: &[ResultItem],
    usage: &UserSelectedRecord,
    pinned: &TopMostRecord,
) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = items
        .iter()
        .map(|item| {
            let identity = item.identity();
            let score = if pinned.is_pinned(&identity) {
                PINNED_SCORE
            } else {
                let boost = i64::from(usage.selection_count(&identity)) * USAGE_WEIGHT;
                item.score.saturating_add(boost)
            };
            RankedResult {
                item: item.clone(),
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}

/// Usage and pin data the ranking engine reads from
#[derive(Debug, Clone, Default)]
pub struct RankingContext {
    pub usage: Arc<UserSelectedRecord>,
    pub top_most: Arc<TopMostRecord>,
}

impl RankingContext {
    pub fn new(usage: Arc<UserSelectedRecord>, top_most: Arc<TopMostRecord>) -> Self {
        Self { usage, top_most }
    }

    pub fn rank(&self, items: &[ResultItem]) -> Vec<RankedResult> {
        rank(items, &self.usage, &self.top_most)
    }
}
