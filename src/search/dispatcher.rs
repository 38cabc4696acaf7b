//! Dispatch of routed queries to plugins

use super::session::{DispatchState, QuerySession};
use crate::config::SearchSettings;
use crate::error::Error;
use crate::metrics::{Metrics, RoundStats};
use crate::plugins::RegisteredPlugin;
use crate::query::{Query, RoutedQuery};
use crate::ranking::RankingContext;
use crate::results::{OriginQuery, ResultAggregator, ResultItem};
use futures::future::join_all;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Timing knobs for a dispatch round
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Pause before the fast wave, abandoned when a newer query arrives
    pub debounce: Duration,
    /// How long to wait for the fast wave before showing partial results
    pub fast_wave_timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(20),
            fast_wave_timeout: None,
        }
    }
}

impl From<&SearchSettings> for DispatchOptions {
    fn from(settings: &SearchSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            fast_wave_timeout: settings.fast_wave_timeout(),
        }
    }
}

/// How a dispatch round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Both waves ran and the final ranking was emitted
    Completed { generation: u64, result_count: usize },
    /// A newer query superseded the round
    Cancelled { generation: u64 },
    /// Nothing was eligible, so nothing ran
    Skipped { generation: u64 },
}

impl DispatchOutcome {
    pub fn generation(&self) -> u64 {
        match *self {
            Self::Completed { generation, .. }
            | Self::Cancelled { generation }
            | Self::Skipped { generation } => generation,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

enum HandleInner {
    Ready(DispatchOutcome),
    Running(JoinHandle<DispatchOutcome>),
}

/// Handle to a dispatch round running in the background
pub struct DispatchHandle {
    generation: u64,
    inner: HandleInner,
}

impl DispatchHandle {
    fn ready(outcome: DispatchOutcome) -> Self {
        Self {
            generation: outcome.generation(),
            inner: HandleInner::Ready(outcome),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        match &self.inner {
            HandleInner::Ready(_) => true,
            HandleInner::Running(handle) => handle.is_finished(),
        }
    }

    /// Wait for the round to end
    pub async fn wait(self) -> DispatchOutcome {
        match self.inner {
            HandleInner::Ready(outcome) => outcome,
            HandleInner::Running(handle) => handle.await.unwrap_or(DispatchOutcome::Cancelled {
                generation: self.generation,
            }),
        }
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("generation", &self.generation)
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wave {
    Fast,
    Delayed,
}

/// Fans routed queries out to plugins and feeds the aggregator.
///
/// Each round cancels its predecessor, runs every eligible plugin on the
/// blocking pool, emits one ranking after the fast wave and one after the
/// delayed wave.
#[derive(Clone)]
pub struct Dispatcher {
    aggregator: Arc<ResultAggregator>,
    ranking: RankingContext,
    metrics: Arc<Metrics>,
    options: DispatchOptions,
    runtime: Handle,
}

impl Dispatcher {
    pub fn new(
        aggregator: Arc<ResultAggregator>,
        ranking: RankingContext,
        metrics: Arc<Metrics>,
        options: DispatchOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            aggregator,
            ranking,
            metrics,
            options,
            runtime,
        }
    }

    pub fn aggregator(&self) -> &Arc<ResultAggregator> {
        &self.aggregator
    }

    pub fn ranking(&self) -> &RankingContext {
        &self.ranking
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// A session whose generations are counted by this dispatcher's aggregator
    pub fn session(&self) -> QuerySession {
        QuerySession::new(self.aggregator.clone())
    }

    /// Start a round for `routed`, superseding whatever `session` was running.
    ///
    /// `session` must come from [`Dispatcher::session`]. Returns immediately;
    /// plugin work happens on the runtime.
    pub fn dispatch(&self, session: &QuerySession, routed: RoutedQuery) -> DispatchHandle {
        let (generation, cancel) = session.advance();

        if routed.is_empty() {
            debug!("Nothing to dispatch for generation {}", generation);
            self.aggregator.reset(generation);
            return DispatchHandle::ready(DispatchOutcome::Skipped { generation });
        }

        let eligible = routed.plugin_ids();
        if let Some(removed) = self.aggregator.begin_generation(generation, &eligible) {
            if removed > 0 {
                debug!("Removed {} results of plugins no longer routed to", removed);
                self.aggregator.refresh(&self.ranking);
            }
        }

        self.metrics.inc_round();
        session.set_state(generation, DispatchState::Dispatching);
        debug!(
            "Dispatching '{}' (generation {}) to {} plugins",
            routed.raw_text,
            generation,
            routed.entries.len()
        );

        let this = self.clone();
        let session = session.clone();
        let handle = self
            .runtime
            .spawn(async move { this.run_round(session, routed, generation, cancel).await });

        DispatchHandle {
            generation,
            inner: HandleInner::Running(handle),
        }
    }

    async fn run_round(
        self,
        session: QuerySession,
        routed: RoutedQuery,
        generation: u64,
        cancel: CancellationToken,
    ) -> DispatchOutcome {
        let started = Instant::now();

        if !self.options.debounce.is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return self.cancelled(&session, generation),
                _ = tokio::time::sleep(self.options.debounce) => {}
            }
        }

        let fast: Vec<_> = routed
            .entries
            .iter()
            .map(|entry| {
                let query = routed.query_for(entry, generation, cancel.clone());
                self.spawn_invocation(entry.plugin.clone(), query, Wave::Fast)
            })
            .collect();
        if !self.settle(fast, generation, &cancel, self.options.fast_wave_timeout).await {
            return self.cancelled(&session, generation);
        }
        let Some(mut result_count) = self.aggregator.emit(generation, &self.ranking) else {
            return self.cancelled(&session, generation);
        };

        let delayed: Vec<_> = routed
            .entries
            .iter()
            .filter(|entry| entry.plugin.metadata.supports_delayed)
            .map(|entry| {
                let query = routed.query_for(entry, generation, cancel.clone());
                self.spawn_invocation(entry.plugin.clone(), query, Wave::Delayed)
            })
            .collect();
        if !delayed.is_empty() {
            if !self.settle(delayed, generation, &cancel, None).await {
                return self.cancelled(&session, generation);
            }
            match self.aggregator.emit(generation, &self.ranking) {
                Some(count) => result_count = count,
                None => return self.cancelled(&session, generation),
            }
        }

        let stats = RoundStats {
            generation,
            elapsed_ms: started.elapsed().as_millis() as u64,
            result_count,
            query_length: routed.raw_text.chars().count(),
        };
        debug!(
            "Generation {} completed with {} results in {}ms",
            generation, stats.result_count, stats.elapsed_ms
        );
        self.metrics.record_round(stats);
        session.set_state(generation, DispatchState::Completed);

        DispatchOutcome::Completed {
            generation,
            result_count,
        }
    }

    /// Wait for a wave; `false` if the round was cancelled meanwhile.
    ///
    /// With a time box, a partial ranking is emitted when it expires and
    /// the remaining plugins are still awaited.
    async fn settle(
        &self,
        handles: Vec<JoinHandle<()>>,
        generation: u64,
        cancel: &CancellationToken,
        time_box: Option<Duration>,
    ) -> bool {
        let mut wave = Box::pin(join_all(handles));

        if let Some(limit) = time_box {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = &mut wave => return !cancel.is_cancelled(),
                _ = tokio::time::sleep(limit) => {
                    debug!(
                        "Fast wave of generation {} exceeded {:?}, emitting partial results",
                        generation, limit
                    );
                    self.aggregator.emit(generation, &self.ranking);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = &mut wave => !cancel.is_cancelled(),
        }
    }

    fn spawn_invocation(
        &self,
        plugin: RegisteredPlugin,
        query: Query,
        wave: Wave,
    ) -> JoinHandle<()> {
        let aggregator = self.aggregator.clone();
        let metrics = self.metrics.clone();

        self.runtime.spawn(async move {
            let plugin_id = plugin.id().to_string();
            let generation = query.generation;
            let cancel = query.cancellation().clone();
            let origin = OriginQuery {
                raw_text: query.raw_text.clone(),
                generation,
            };

            let started = Instant::now();
            let provider = plugin.plugin.clone();
            let outcome = tokio::task::spawn_blocking(move || match wave {
                Wave::Fast => provider.query(&query),
                Wave::Delayed => provider.query_delayed(&query),
            })
            .await;

            if cancel.is_cancelled() {
                return;
            }
            metrics.record_plugin_query(&plugin_id, started.elapsed().as_millis() as u64);

            let items = match outcome {
                Ok(Ok(items)) => items,
                Ok(Err(e)) => {
                    warn!("{}", Error::plugin(&plugin_id, e));
                    metrics.record_failure(&plugin_id);
                    Vec::new()
                }
                Err(e) if e.is_panic() => {
                    let message = panic_message(e.into_panic());
                    error!("{}", Error::plugin(&plugin_id, format!("panicked: {}", message)));
                    metrics.record_failure(&plugin_id);
                    Vec::new()
                }
                Err(_) => return,
            };

            // An empty delayed batch leaves the fast-wave results in place
            if wave == Wave::Delayed && items.is_empty() {
                return;
            }

            let items = items
                .into_iter()
                .map(|mut item| {
                    item.plugin_id = plugin_id.clone();
                    item.origin = origin.clone();
                    item
                })
                .collect::<Vec<ResultItem>>();
            let count = items.len();
            if aggregator.publish(&plugin_id, generation, items) {
                debug!(
                    "{} published {} results for generation {} ({:?} wave)",
                    plugin_id, count, generation, wave
                );
            }
        })
    }

    fn cancelled(&self, session: &QuerySession, generation: u64) -> DispatchOutcome {
        debug!("Generation {} cancelled", generation);
        self.metrics.inc_cancelled();
        session.set_state(generation, DispatchState::Cancelled);
        DispatchOutcome::Cancelled { generation }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
