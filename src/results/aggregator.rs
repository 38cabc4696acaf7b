//! Result aggregator for merging plugin batches into the visible set

use super::types::*;
use crate::ranking::RankingContext;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

struct AggregatorState {
    /// Generation whose batches are currently accepted
    generation: u64,
    /// Visible entries in insertion order, at most one per identity
    entries: Vec<ResultItem>,
    /// Some plugin has published for the current generation
    published: bool,
}

/// Thread-safe merge point for results from concurrently running plugins.
///
/// Every mutation and every snapshot goes through one mutex, so ranking
/// always sees a consistent set and stale generations can never slip in
/// between the generation check and the write.
pub struct ResultAggregator {
    state: Mutex<AggregatorState>,
    snapshots: watch::Sender<ResultsSnapshot>,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    /// Create an empty aggregator at generation 0
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(ResultsSnapshot::default());
        Self {
            state: Mutex::new(AggregatorState {
                generation: 0,
                entries: Vec::new(),
                published: false,
            }),
            snapshots,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every ranked snapshot emitted from now on
    pub fn subscribe(&self) -> watch::Receiver<ResultsSnapshot> {
        self.snapshots.subscribe()
    }

    /// The most recently emitted snapshot
    pub fn latest(&self) -> ResultsSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.lock().generation
    }

    /// Move to the next generation and return it.
    ///
    /// From here on batches and emits of older generations are discarded.
    /// Entries stay visible until the new generation publishes.
    pub fn advance(&self) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        state.published = false;
        state.generation
    }

    /// Drop entries of plugins outside `eligible`.
    ///
    /// Returns the number of removed entries, or `None` when `generation` is
    /// no longer current.
    pub fn begin_generation(&self, generation: u64, eligible: &HashSet<String>) -> Option<usize> {
        let mut state = self.lock();
        if generation != state.generation {
            return None;
        }

        let before = state.entries.len();
        state
            .entries
            .retain(|entry| eligible.contains(&entry.plugin_id));
        Some(before - state.entries.len())
    }

    /// Replace `plugin_id`'s entries with `items` if `generation` is current.
    ///
    /// Entries whose identity survives are updated in place so their list
    /// position is kept, vanished ones are removed and new ones appended.
    /// Returns `false` when the batch was discarded as stale.
    pub fn publish(&self, plugin_id: &str, generation: u64, items: Vec<ResultItem>) -> bool {
        let mut state = self.lock();
        if generation != state.generation {
            debug!(
                "Discarding {} results from {} for stale generation {} (current {})",
                items.len(),
                plugin_id,
                generation,
                state.generation
            );
            return false;
        }

        let mut seen = HashSet::with_capacity(items.len());
        let mut incoming: Vec<Option<ResultItem>> = Vec::with_capacity(items.len());
        for mut item in items {
            item.plugin_id = plugin_id.to_string();
            item.origin.generation = generation;
            if seen.insert(item.identity()) {
                incoming.push(Some(item));
            }
        }
        let positions: HashMap<ResultIdentity, usize> = incoming
            .iter()
            .enumerate()
            .filter_map(|(pos, item)| item.as_ref().map(|i| (i.identity(), pos)))
            .collect();

        state.entries.retain_mut(|entry| {
            if entry.plugin_id != plugin_id {
                return true;
            }
            match positions.get(&entry.identity()) {
                Some(&pos) => match incoming[pos].take() {
                    Some(fresh) => {
                        *entry = fresh;
                        true
                    }
                    None => false,
                },
                None => false,
            }
        });
        state.entries.extend(incoming.into_iter().flatten());
        state.published = true;
        true
    }

    /// Keep only the entries produced by `plugin_id`
    pub fn remove_results_except(&self, plugin_id: &str) {
        self.lock().entries.retain(|entry| entry.plugin_id == plugin_id);
    }

    /// Drop every entry produced by `plugin_id`
    pub fn remove_results_for(&self, plugin_id: &str) {
        self.lock().entries.retain(|entry| entry.plugin_id != plugin_id);
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drop everything and emit a hidden empty snapshot, if `generation` is current
    pub fn reset(&self, generation: u64) {
        let mut state = self.lock();
        if generation != state.generation {
            return;
        }
        state.entries.clear();
        self.snapshots.send_replace(ResultsSnapshot::empty(generation));
    }

    /// Rank the visible set and emit it, if `generation` is still current.
    ///
    /// Entries left over from older generations are purged first. Ranking
    /// happens under the lock, so a newer generation cannot interleave.
    /// Returns the number of emitted results.
    pub fn emit(&self, generation: u64, ranking: &RankingContext) -> Option<usize> {
        let mut state = self.lock();
        if generation != state.generation {
            return None;
        }
        state
            .entries
            .retain(|entry| entry.origin.generation >= generation);

        let ranked = ranking.rank(&state.entries);
        let count = ranked.len();
        self.snapshots.send_replace(ResultsSnapshot {
            generation,
            results: Arc::new(ranked),
            visible: count > 0,
        });
        Some(count)
    }

    /// Re-rank and emit the visible set, e.g. after a pin change.
    ///
    /// Until the current generation has published, the previous results stay
    /// visible and the snapshot carries the newest generation among them.
    pub fn refresh(&self, ranking: &RankingContext) {
        let mut state = self.lock();
        let generation = if state.published {
            state.generation
        } else {
            state
                .entries
                .iter()
                .map(|entry| entry.origin.generation)
                .max()
                .unwrap_or(state.generation)
        };
        state
            .entries
            .retain(|entry| entry.origin.generation >= generation);

        let ranked = ranking.rank(&state.entries);
        let visible = !ranked.is_empty();
        self.snapshots.send_replace(ResultsSnapshot {
            generation,
            results: Arc::new(ranked),
            visible,
        });
    }

    /// Copy of the unranked visible set
    pub fn items(&self) -> Vec<ResultItem> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn item(title: &str, score: i64, generation: u64) -> ResultItem {
        let mut item = ResultItem::new(title).with_score(score);
        item.origin = OriginQuery {
            raw_text: "q".to_string(),
            generation,
        };
        item
    }

    fn all(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn titles(aggregator: &ResultAggregator) -> Vec<String> {
        aggregator.items().into_iter().map(|i| i.title).collect()
    }

    #[test]
    fn test_stale_generation_is_noop() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.advance();

        assert!(!aggregator.publish("a", 1, vec![item("old", 1, 1)]));
        assert!(aggregator.is_empty());

        assert!(aggregator.publish("a", 2, vec![item("new", 1, 2)]));
        assert_eq!(titles(&aggregator), vec!["new"]);
    }

    #[test]
    fn test_advance_closes_previous_generation() {
        let aggregator = ResultAggregator::new();
        let ranking = RankingContext::default();
        let g1 = aggregator.advance();
        assert!(aggregator.publish("a", g1, vec![item("a1", 1, g1)]));
        aggregator.emit(g1, &ranking);

        // a worker of g1 that finished after g2 started
        let g2 = aggregator.advance();
        assert!(!aggregator.publish("a", g1, vec![item("stale", 1, g1)]));
        assert_eq!(aggregator.emit(g1, &ranking), None);
        assert_eq!(aggregator.begin_generation(g1, &all(&["a"])), None);

        assert_eq!(aggregator.latest().generation, g1);
        assert_eq!(aggregator.latest().titles(), vec!["a1"]);
        assert_eq!(titles(&aggregator), vec!["a1"]);

        assert_eq!(aggregator.emit(g2, &ranking), Some(0));
        assert!(!aggregator.latest().visible);
    }

    #[test]
    fn test_publish_stamps_generation() {
        let aggregator = ResultAggregator::new();
        let generation = aggregator.advance();
        aggregator.publish("a", generation, vec![item("a1", 1, 0)]);

        assert_eq!(aggregator.items()[0].origin.generation, generation);
    }

    #[test]
    fn test_publish_updates_in_place() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1), item("a2", 1, 1)]);
        aggregator.publish("b", 1, vec![item("b1", 1, 1)]);

        aggregator.publish(
            "a",
            1,
            vec![item("a3", 1, 1), item("a2", 42, 1)],
        );

        assert_eq!(titles(&aggregator), vec!["a2", "b1", "a3"]);
        let a2 = aggregator
            .items()
            .into_iter()
            .find(|i| i.title == "a2")
            .unwrap();
        assert_eq!(a2.score, 42);
    }

    #[test]
    fn test_one_entry_per_identity() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("dup", 1, 1), item("dup", 2, 1)]);

        assert_eq!(aggregator.len(), 1);
        assert_eq!(aggregator.items()[0].score, 1);
    }

    #[test]
    fn test_begin_generation_removes_ineligible_plugins() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.publish("b", 1, vec![item("b1", 1, 1)]);

        let generation = aggregator.advance();
        let removed = aggregator.begin_generation(generation, &all(&["a"]));
        assert_eq!(removed, Some(1));
        assert_eq!(titles(&aggregator), vec!["a1"]);

        assert_eq!(aggregator.begin_generation(1, &all(&[])), None);
        assert_eq!(aggregator.current_generation(), 2);
        assert_eq!(titles(&aggregator), vec!["a1"]);
    }

    #[test]
    fn test_remove_helpers() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.publish("b", 1, vec![item("b1", 1, 1)]);

        aggregator.remove_results_except("a");
        assert_eq!(titles(&aggregator), vec!["a1"]);

        aggregator.publish("b", 1, vec![item("b1", 1, 1)]);
        aggregator.remove_results_for("a");
        assert_eq!(titles(&aggregator), vec!["b1"]);

        aggregator.clear();
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_emit_purges_older_generations() {
        let aggregator = ResultAggregator::new();
        let ranking = RankingContext::default();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a-old", 1, 1)]);
        aggregator.publish("b", 1, vec![item("b-old", 1, 1)]);

        aggregator.advance();
        aggregator.publish("b", 2, vec![item("b-new", 1, 2)]);
        assert_eq!(aggregator.emit(2, &ranking), Some(1));

        let snapshot = aggregator.latest();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.titles(), vec!["b-new"]);
        assert!(snapshot.results.iter().all(|r| r.generation() == 2));
        assert!(snapshot.visible);

        assert_eq!(aggregator.emit(1, &ranking), None);
    }

    #[test]
    fn test_refresh_keeps_previous_results_until_publish() {
        let aggregator = ResultAggregator::new();
        let ranking = RankingContext::default();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a-old", 1, 1)]);
        aggregator.publish("b", 1, vec![item("b-old", 1, 1)]);

        aggregator.advance();
        aggregator.refresh(&ranking);
        let snapshot = aggregator.latest();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.generation, 1);
        assert!(snapshot.results.iter().all(|r| r.generation() == snapshot.generation));

        aggregator.publish("a", 2, vec![item("a-new", 1, 2)]);
        aggregator.refresh(&ranking);
        let snapshot = aggregator.latest();
        assert_eq!(snapshot.titles(), vec!["a-new"]);
        assert_eq!(snapshot.generation, 2);
    }

    #[test]
    fn test_refresh_tags_mixed_leftovers_with_newest_generation() {
        let aggregator = ResultAggregator::new();
        let ranking = RankingContext::default();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.advance();
        aggregator.publish("b", 2, vec![item("b2", 1, 2)]);

        // generation 2 was cancelled before emitting
        aggregator.advance();
        aggregator.refresh(&ranking);
        let snapshot = aggregator.latest();
        assert_eq!(snapshot.generation, 2);
        assert_eq!(snapshot.titles(), vec!["b2"]);
    }

    #[test]
    fn test_refresh_without_entries_uses_current_generation() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.refresh(&RankingContext::default());

        let snapshot = aggregator.latest();
        assert_eq!(snapshot.generation, 1);
        assert!(!snapshot.visible);
    }

    #[test]
    fn test_reset_emits_hidden_snapshot() {
        let aggregator = ResultAggregator::new();
        let mut rx = aggregator.subscribe();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.emit(1, &RankingContext::default());

        aggregator.reset(1);
        assert!(aggregator.is_empty());

        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.advance();
        aggregator.reset(2);
        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.generation, 2);
        assert!(!snapshot.visible);
        assert!(snapshot.is_empty());
        assert!(aggregator.is_empty());
    }

    #[test]
    fn test_reset_of_stale_generation_is_ignored() {
        let aggregator = ResultAggregator::new();
        aggregator.advance();
        aggregator.publish("a", 1, vec![item("a1", 1, 1)]);
        aggregator.advance();

        aggregator.reset(1);
        assert_eq!(titles(&aggregator), vec!["a1"]);
    }

    #[test]
    fn test_concurrent_publish() {
        let aggregator = Arc::new(ResultAggregator::new());
        let plugins: Vec<String> = (0..8).map(|i| format!("p{}", i)).collect();
        aggregator.advance();

        let handles: Vec<_> = plugins
            .iter()
            .cloned()
            .map(|plugin| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let batch = (0..5)
                            .map(|i| item(&format!("{}-{}", plugin, i), round, 1))
                            .collect();
                        aggregator.publish(&plugin, 1, batch);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(aggregator.len(), 40);
    }
}
