//! Metrics collection module
//!
//! Tracks plugin latency, failure rates and per-round statistics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Number of response times kept per plugin
const RESPONSE_WINDOW: usize = 100;

/// Summary of one finished dispatch round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub generation: u64,
    pub elapsed_ms: u64,
    pub result_count: usize,
    pub query_length: usize,
}

/// Dispatch metrics collector
#[derive(Debug, Default)]
pub struct Metrics {
    /// Rounds dispatched
    total_rounds: AtomicU64,
    /// Rounds superseded before finishing
    cancelled_rounds: AtomicU64,
    /// Plugin invocations per plugin
    plugin_queries: RwLock<HashMap<String, u64>>,
    /// Plugin response times (rolling window in ms)
    plugin_response_times: RwLock<HashMap<String, Vec<u64>>>,
    /// Plugin failure counts
    plugin_failures: RwLock<HashMap<String, u64>>,
    last_round: RwLock<Option<RoundStats>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_round(&self) {
        self.total_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cancelled(&self) {
        self.cancelled_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a plugin invocation and how long it took
    pub fn record_plugin_query(&self, plugin: &str, time_ms: u64) {
        {
            let mut queries = self
                .plugin_queries
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            *queries.entry(plugin.to_string()).or_insert(0) += 1;
        }

        let mut times = self
            .plugin_response_times
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = times.entry(plugin.to_string()).or_default();
        if entry.len() >= RESPONSE_WINDOW {
            entry.remove(0);
        }
        entry.push(time_ms);
    }

    /// Record a plugin error or panic
    pub fn record_failure(&self, plugin: &str) {
        let mut failures = self
            .plugin_failures
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *failures.entry(plugin.to_string()).or_insert(0) += 1;
    }

    pub fn record_round(&self, stats: RoundStats) {
        *self.last_round.write().unwrap_or_else(PoisonError::into_inner) = Some(stats);
    }

    pub fn total_rounds(&self) -> u64 {
        self.total_rounds.load(Ordering::Relaxed)
    }

    pub fn cancelled_rounds(&self) -> u64 {
        self.cancelled_rounds.load(Ordering::Relaxed)
    }

    pub fn last_round(&self) -> Option<RoundStats> {
        *self.last_round.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn plugin_queries(&self, plugin: &str) -> u64 {
        self.plugin_queries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin)
            .copied()
            .unwrap_or(0)
    }

    pub fn plugin_failures(&self, plugin: &str) -> u64 {
        self.plugin_failures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(plugin)
            .copied()
            .unwrap_or(0)
    }

    /// Get average response time for a plugin
    pub fn avg_response_time(&self, plugin: &str) -> Option<u64> {
        let times = self
            .plugin_response_times
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        times.get(plugin).and_then(|t| {
            if t.is_empty() {
                None
            } else {
                Some(t.iter().sum::<u64>() / t.len() as u64)
            }
        })
    }

    /// Get reliability percentage for a plugin
    pub fn reliability(&self, plugin: &str) -> f64 {
        let total = self.plugin_queries(plugin);
        if total == 0 {
            return 100.0;
        }
        let failures = self.plugin_failures(plugin).min(total);
        ((total - failures) as f64 / total as f64) * 100.0
    }

    /// Get all plugin statistics
    pub fn plugin_stats(&self) -> HashMap<String, PluginStats> {
        let plugins: Vec<String> = self
            .plugin_queries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();

        plugins
            .into_iter()
            .map(|plugin| {
                let stats = PluginStats {
                    queries: self.plugin_queries(&plugin),
                    failures: self.plugin_failures(&plugin),
                    avg_response_time: self.avg_response_time(&plugin),
                    reliability: self.reliability(&plugin),
                };
                (plugin, stats)
            })
            .collect()
    }
}

/// Statistics for a single plugin
#[derive(Debug, Clone)]
pub struct PluginStats {
    pub queries: u64,
    pub failures: u64,
    pub avg_response_time: Option<u64>,
    pub reliability: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.inc_round();
        metrics.record_plugin_query("apps", 100);
        metrics.record_plugin_query("apps", 50);
        metrics.record_failure("apps");

        assert_eq!(metrics.total_rounds(), 1);
        assert_eq!(metrics.avg_response_time("apps"), Some(75));
        assert_eq!(metrics.reliability("apps"), 50.0);
        assert_eq!(metrics.plugin_stats()["apps"].queries, 2);
    }

    #[test]
    fn test_response_window() {
        let metrics = Metrics::new();
        for _ in 0..RESPONSE_WINDOW {
            metrics.record_plugin_query("apps", 0);
        }
        metrics.record_plugin_query("apps", 1_000);

        assert_eq!(metrics.avg_response_time("apps"), Some(10));
    }
}
