//! Launcher session
//!
//! The object a host drives: query text, selection, the results / context
//! menu / history views, hotkey handling and persistence.

use crate::config::{LastQueryMode, SearchSettings, Settings};
use crate::matcher::StringMatcher;
use crate::metrics::Metrics;
use crate::plugins::PluginRegistry;
use crate::query::QueryRouter;
use crate::ranking::RankingContext;
use crate::results::{
    ActionContext, ContextMenuItem, RankedResult, ResultAggregator, ResultItem, ResultsSnapshot,
};
use crate::search::{DispatchHandle, DispatchOptions, DispatchState, Dispatcher, QuerySession};
use crate::storage::{HistoryEntry, PersistenceProvider, Stores};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Which list the selection currently points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedView {
    QueryResults,
    ContextMenu,
    History,
}

/// What `execute_selected` did
#[derive(Debug)]
pub enum ExecuteOutcome {
    /// No selection, or the selected result has no action
    Nothing,
    /// An action ran; `hide` is what it asked for
    Executed { hide: bool },
    /// Went back to the results view and queried a history entry
    Requeried(DispatchHandle),
}

/// A launcher session.
///
/// Owns the stores and the dispatcher; everything the UI needs is read
/// from it or from the snapshot channel returned by [`Launcher::subscribe`].
pub struct Launcher {
    settings: SearchSettings,
    router: QueryRouter,
    dispatcher: Dispatcher,
    session: QuerySession,
    stores: Stores,
    persistence: Arc<dyn PersistenceProvider>,
    matcher: StringMatcher,
    view: SelectedView,
    query_text: String,
    text_before_leave: String,
    selected: usize,
    /// Results generation `selected` refers to
    selected_generation: u64,
    context_items: Vec<ContextMenuItem>,
    history_items: Vec<HistoryEntry>,
    window_visible: bool,
    last_query_selected: bool,
}

impl Launcher {
    /// Create a session, loading persisted state from `persistence`
    pub fn new(
        settings: &Settings,
        registry: Arc<PluginRegistry>,
        persistence: Arc<dyn PersistenceProvider>,
        runtime: Handle,
    ) -> Self {
        let search = settings.search.clone();
        let stores = Stores::load(persistence.as_ref(), search.max_history_items);
        let ranking = RankingContext::new(stores.usage.clone(), stores.top_most.clone());
        let dispatcher = Dispatcher::new(
            Arc::new(ResultAggregator::new()),
            ranking,
            Arc::new(Metrics::new()),
            DispatchOptions::from(&search),
            runtime,
        );

        info!("Launcher session started with {} plugins", registry.len());

        Self {
            matcher: StringMatcher::new(search.search_precision),
            settings: search,
            router: QueryRouter::new(registry),
            session: dispatcher.session(),
            dispatcher,
            stores,
            persistence,
            view: SelectedView::QueryResults,
            query_text: String::new(),
            text_before_leave: String::new(),
            selected: 0,
            selected_generation: 0,
            context_items: Vec::new(),
            history_items: Vec::new(),
            window_visible: false,
            last_query_selected: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ResultsSnapshot> {
        self.dispatcher.aggregator().subscribe()
    }

    /// Latest ranked results
    pub fn snapshot(&self) -> ResultsSnapshot {
        self.dispatcher.aggregator().latest()
    }

    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    pub fn view(&self) -> SelectedView {
        self.view
    }

    pub fn is_visible(&self) -> bool {
        self.window_visible
    }

    pub fn show(&mut self) {
        self.window_visible = true;
    }

    pub fn hide(&mut self) {
        self.window_visible = false;
    }

    /// Whether the host should select the whole query text when showing
    pub fn last_query_selected(&self) -> bool {
        self.last_query_selected
    }

    pub fn dispatch_state(&self) -> DispatchState {
        self.session.state()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.dispatcher.metrics()
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn context_items(&self) -> &[ContextMenuItem] {
        &self.context_items
    }

    /// History entries shown in the history view
    pub fn history_results(&self) -> &[HistoryEntry] {
        &self.history_items
    }

    /// Store `text` as the query text and run a query
    pub fn set_query_text(&mut self, text: impl Into<String>) -> Option<DispatchHandle> {
        self.query_text = text.into();
        self.query()
    }

    /// Replace the query text, running a query only when `requery` is set
    pub fn change_query_text(
        &mut self,
        text: impl Into<String>,
        requery: bool,
    ) -> Option<DispatchHandle> {
        self.query_text = text.into();
        if requery {
            self.query()
        } else {
            None
        }
    }

    /// Query the current text in the current view.
    ///
    /// Dispatches to plugins in the results view and filters history in the
    /// history view. The context menu does not query.
    pub fn query(&mut self) -> Option<DispatchHandle> {
        match self.view {
            SelectedView::QueryResults => {
                let routed = self.router.route(&self.query_text);
                Some(self.dispatcher.dispatch(&self.session, routed))
            }
            SelectedView::History => {
                self.history_items = self
                    .stores
                    .history
                    .query_history(&self.query_text, &self.matcher);
                self.selected = self.history_items.len().saturating_sub(1);
                None
            }
            SelectedView::ContextMenu => None,
        }
    }

    fn view_len(&self) -> usize {
        match self.view {
            SelectedView::QueryResults => self.snapshot().len(),
            SelectedView::ContextMenu => self.context_items.len(),
            SelectedView::History => self.history_items.len(),
        }
    }

    /// Index of the selection in the current view
    pub fn selected_index(&self) -> usize {
        if self.view == SelectedView::QueryResults {
            let snapshot = self.snapshot();
            if snapshot.generation != self.selected_generation {
                return 0;
            }
            return self.selected.min(snapshot.len().saturating_sub(1));
        }
        self.selected.min(self.view_len().saturating_sub(1))
    }

    /// The selected ranked result, when the results view is active
    pub fn selected_result(&self) -> Option<RankedResult> {
        if self.view != SelectedView::QueryResults {
            return None;
        }
        self.snapshot()
            .results
            .get(self.selected_index())
            .cloned()
    }

    /// Select `index`, wrapped into the current view
    pub fn select_result(&mut self, index: i64) {
        let len = self.view_len();
        self.selected = wrap_index(index, len);
        if self.view == SelectedView::QueryResults {
            self.selected_generation = self.snapshot().generation;
        }
    }

    fn move_selection(&mut self, delta: i64) {
        let current = self.selected_index() as i64;
        self.select_result(current + delta);
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_prev(&mut self) {
        self.move_selection(-1);
    }

    pub fn select_next_page(&mut self) {
        self.move_selection(self.settings.max_results_to_show as i64);
    }

    pub fn select_prev_page(&mut self) {
        self.move_selection(-(self.settings.max_results_to_show as i64));
    }

    pub fn select_first(&mut self) {
        self.select_result(0);
    }

    pub fn execute_selected(&mut self) -> ExecuteOutcome {
        self.execute_selected_with(ActionContext::default())
    }

    /// Run whatever is selected in the current view
    pub fn execute_selected_with(&mut self, context: ActionContext) -> ExecuteOutcome {
        match self.view {
            SelectedView::QueryResults => {
                let Some(ranked) = self.selected_result() else {
                    return ExecuteOutcome::Nothing;
                };
                let item = ranked.item;
                let Some(action) = item.action.clone() else {
                    return ExecuteOutcome::Nothing;
                };

                debug!("Executing {}", item.identity());
                let hide = action.invoke(&context);
                self.record_selection(&item);
                self.stores.history.record_query(&item.origin.raw_text);
                if hide {
                    self.hide();
                }
                ExecuteOutcome::Executed { hide }
            }
            SelectedView::ContextMenu => {
                let Some(entry) = self.context_items.get(self.selected_index()).cloned() else {
                    return ExecuteOutcome::Nothing;
                };

                debug!("Executing context menu item '{}'", entry.title);
                let hide = entry.action.invoke(&context);
                self.return_to_results();
                if hide {
                    self.hide();
                }
                ExecuteOutcome::Executed { hide }
            }
            SelectedView::History => {
                let Some(entry) = self.history_items.get(self.selected_index()).cloned() else {
                    return ExecuteOutcome::Nothing;
                };

                self.return_to_results();
                match self.change_query_text(entry.query, true) {
                    Some(handle) => ExecuteOutcome::Requeried(handle),
                    None => ExecuteOutcome::Nothing,
                }
            }
        }
    }

    /// Count a selection of `item` towards its usage boost
    pub fn record_selection(&self, item: &ResultItem) {
        self.stores.usage.record_selection(item.identity());
    }

    /// Open the selected result's context menu, or go back to the results
    pub fn load_context_menu(&mut self) {
        if self.view != SelectedView::QueryResults {
            self.return_to_results();
            return;
        }

        self.context_items = self
            .selected_result()
            .map(|ranked| ranked.item.context_menu)
            .unwrap_or_default();
        self.leave_results(SelectedView::ContextMenu);
        self.selected = 0;
    }

    /// Open the history view, or go back to the results
    pub fn load_history(&mut self) {
        if self.view != SelectedView::QueryResults {
            self.return_to_results();
            return;
        }
        self.leave_results(SelectedView::History);
    }

    /// Leave a secondary view, or hide the window from the results view
    pub fn escape(&mut self) {
        if self.view != SelectedView::QueryResults {
            self.return_to_results();
        } else {
            self.hide();
        }
    }

    /// Handle the global hotkey: apply the last query mode and toggle the window
    pub fn on_hotkey(&mut self) -> Option<DispatchHandle> {
        let handle = match self.settings.last_query_mode {
            LastQueryMode::Empty => self.change_query_text(String::new(), true),
            LastQueryMode::Preserved => {
                self.last_query_selected = true;
                None
            }
            LastQueryMode::Selected => {
                self.last_query_selected = false;
                None
            }
        };

        self.window_visible = !self.window_visible;
        handle
    }

    /// Pin the result at `index` of the results view
    pub fn set_top_most(&mut self, index: usize) -> bool {
        let Some(ranked) = self.result_at(index) else {
            return false;
        };
        self.stores.top_most.pin(ranked.item.identity());
        self.refresh();
        true
    }

    /// Unpin the result at `index` of the results view
    pub fn unset_top_most(&mut self, index: usize) -> bool {
        let Some(ranked) = self.result_at(index) else {
            return false;
        };
        let removed = self.stores.top_most.unpin(&ranked.item.identity());
        if removed {
            self.refresh();
        }
        removed
    }

    fn result_at(&self, index: usize) -> Option<RankedResult> {
        if self.view != SelectedView::QueryResults {
            return None;
        }
        self.snapshot().results.get(index).cloned()
    }

    fn refresh(&self) {
        self.dispatcher
            .aggregator()
            .refresh(self.dispatcher.ranking());
    }

    /// Persist history, usage and pins; failures are logged
    pub fn save(&self) -> bool {
        match self.persistence.save(&self.stores.to_state()) {
            Ok(()) => {
                debug!("Saved launcher state");
                true
            }
            Err(e) => {
                error!("Failed to save launcher state: {}", e);
                false
            }
        }
    }

    fn leave_results(&mut self, view: SelectedView) {
        self.text_before_leave = std::mem::take(&mut self.query_text);
        self.view = view;
        self.query();
    }

    fn return_to_results(&mut self) {
        self.view = SelectedView::QueryResults;
        self.context_items.clear();
        self.history_items.clear();
        let text = std::mem::take(&mut self.text_before_leave);
        self.change_query_text(text, false);
    }

    /// Completion shown after the typed text for the first result
    pub fn autocomplete_text(index: usize, input: &str, query: &str) -> String {
        if input.is_empty() || query.is_empty() || index != 0 {
            return String::new();
        }
        match strip_prefix_ignore_case(input, query) {
            Some(rest) => format!("{}{}", query, rest),
            None => String::new(),
        }
    }

    /// Text the input box should hold when the result at `index` is picked
    pub fn search_text(index: usize, input: &str, query: &str) -> String {
        if input.is_empty() {
            return String::new();
        }
        if index == 0 && !query.is_empty() {
            if let Some(rest) = strip_prefix_ignore_case(input, query) {
                return format!("{}{}", query, rest);
            }
        }
        input.to_string()
    }
}

impl Drop for Launcher {
    fn drop(&mut self) {
        self.session.cancel();
    }
}

fn wrap_index(index: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    index.rem_euclid(len as i64) as usize
}

/// `input` without a case-insensitive `prefix`
fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let mut chars = input.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let offset = chars.next().map_or(input.len(), |(i, _)| i);
    Some(&input[offset..])
}
