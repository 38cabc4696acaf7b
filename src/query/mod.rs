//! Query routing module
//!
//! Decides which plugins see a piece of input and with what search term:
//! - `img cat` goes only to the plugin bound to `img`, searching `cat`
//! - anything else goes to every enabled global plugin with the full text

use crate::plugins::{PluginRegistry, RegisteredPlugin};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One plugin's view of a dispatched query
#[derive(Debug, Clone)]
pub struct Query {
    /// Raw text as typed by the user
    pub raw_text: String,
    /// Action keyword that selected the plugin, if any
    pub action_keyword: Option<String>,
    /// Search term with the action keyword removed
    pub search: String,
    /// Dispatch generation
    pub generation: u64,
    cancel: CancellationToken,
}

impl Query {
    pub fn new(
        raw_text: impl Into<String>,
        action_keyword: Option<String>,
        search: impl Into<String>,
        generation: u64,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            action_keyword,
            search: search.into(),
            generation,
            cancel,
        }
    }

    /// A query outside of any dispatch round, mainly for calling plugins directly
    pub fn detached(raw_text: impl Into<String>, search: impl Into<String>) -> Self {
        Self::new(raw_text, None, search, 0, CancellationToken::new())
    }

    /// Whether a newer query has superseded this one
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whitespace-separated words of the search term
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.search.split_whitespace()
    }
}

/// A plugin selected by the router and the term it should search for
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub plugin: RegisteredPlugin,
    pub search: String,
}

/// Result of routing one piece of input
#[derive(Debug, Clone, Default)]
pub struct RoutedQuery {
    pub raw_text: String,
    pub action_keyword: Option<String>,
    /// Eligible plugins in dispatch order
    pub entries: Vec<RouteEntry>,
}

impl RoutedQuery {
    /// No plugin is eligible
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn plugin_ids(&self) -> HashSet<String> {
        self.entries
            .iter()
            .map(|e| e.plugin.id().to_string())
            .collect()
    }

    /// Build the query a routed plugin receives for `generation`
    pub fn query_for(&self, entry: &RouteEntry, generation: u64, cancel: CancellationToken) -> Query {
        Query::new(
            self.raw_text.clone(),
            self.action_keyword.clone(),
            entry.search.clone(),
            generation,
            cancel,
        )
    }
}

/// Routes raw input to eligible plugins
#[derive(Debug, Clone)]
pub struct QueryRouter {
    registry: Arc<PluginRegistry>,
}

impl QueryRouter {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Route `raw_text`.
    ///
    /// Keywords are tried longest first and must be followed by whitespace.
    /// Disabled plugins never match. Keyword-bound plugins are excluded
    /// when their keyword is not used.
    pub fn route(&self, raw_text: &str) -> RoutedQuery {
        let text = raw_text.trim_start();
        if text.trim_end().is_empty() {
            return RoutedQuery {
                raw_text: raw_text.to_string(),
                ..Default::default()
            };
        }

        for (keyword, plugin) in self.registry.keyword_plugins() {
            if plugin.metadata.disabled {
                continue;
            }
            let Some(rest) = text.strip_prefix(keyword) else {
                continue;
            };
            if rest.starts_with(char::is_whitespace) {
                return RoutedQuery {
                    raw_text: raw_text.to_string(),
                    action_keyword: Some(keyword.to_string()),
                    entries: vec![RouteEntry {
                        plugin: plugin.clone(),
                        search: rest.trim().to_string(),
                    }],
                };
            }
        }

        let search = text.trim_end().to_string();
        RoutedQuery {
            raw_text: raw_text.to_string(),
            action_keyword: None,
            entries: self
                .registry
                .global_plugins()
                .map(|plugin| RouteEntry {
                    plugin: plugin.clone(),
                    search: search.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Plugin, PluginMetadata};
    use crate::results::ResultItem;

    struct Stub(PluginMetadata);

    impl Plugin for Stub {
        fn metadata(&self) -> PluginMetadata {
            self.0.clone()
        }

        fn query(&self, _query: &Query) -> anyhow::Result<Vec<ResultItem>> {
            Ok(Vec::new())
        }
    }

    fn router(plugins: Vec<PluginMetadata>) -> QueryRouter {
        let mut registry = PluginRegistry::new();
        for metadata in plugins {
            registry.register(Arc::new(Stub(metadata)));
        }
        QueryRouter::new(Arc::new(registry))
    }

    fn ids(routed: &RoutedQuery) -> Vec<&str> {
        routed.entries.iter().map(|e| e.plugin.id()).collect()
    }

    #[test]
    fn test_empty_input_routes_nowhere() {
        let router = router(vec![PluginMetadata::global("b", "B")]);
        assert!(router.route("").is_empty());
        assert!(router.route("   ").is_empty());
    }

    #[test]
    fn test_keyword_routes_exclusively() {
        let router = router(vec![
            PluginMetadata::keyword("a", "A", "img"),
            PluginMetadata::global("b", "B"),
        ]);

        let routed = router.route("img cat");
        assert_eq!(ids(&routed), vec!["a"]);
        assert_eq!(routed.entries[0].search, "cat");
        assert_eq!(routed.action_keyword.as_deref(), Some("img"));
    }

    #[test]
    fn test_global_plugins_get_full_text() {
        let router = router(vec![
            PluginMetadata::keyword("a", "A", "img"),
            PluginMetadata::global("b", "B"),
            PluginMetadata::global("c", "C"),
            PluginMetadata::global("d", "D").with_disabled(true),
        ]);

        let routed = router.route("  cat pictures ");
        assert_eq!(ids(&routed), vec!["b", "c"]);
        assert!(routed.entries.iter().all(|e| e.search == "cat pictures"));
        assert!(routed.action_keyword.is_none());
    }

    #[test]
    fn test_keyword_requires_separator() {
        let router = router(vec![
            PluginMetadata::keyword("a", "A", "img"),
            PluginMetadata::global("b", "B"),
        ]);

        assert_eq!(ids(&router.route("imgcat")), vec!["b"]);
        assert_eq!(ids(&router.route("img")), vec!["b"]);

        let routed = router.route("img ");
        assert_eq!(ids(&routed), vec!["a"]);
        assert_eq!(routed.entries[0].search, "");
    }

    #[test]
    fn test_longest_keyword_wins() {
        let router = router(vec![
            PluginMetadata::keyword("g", "G", "g"),
            PluginMetadata::keyword("gh", "GH", "gh"),
            PluginMetadata::keyword("ghx", "GHX", "g h"),
        ]);

        assert_eq!(ids(&router.route("gh rust")), vec!["gh"]);
        assert_eq!(ids(&router.route("g rust")), vec!["g"]);

        let routed = router.route("g h rust");
        assert_eq!(ids(&routed), vec!["ghx"]);
        assert_eq!(routed.entries[0].search, "rust");
    }

    #[test]
    fn test_disabled_keyword_falls_through() {
        let router = router(vec![
            PluginMetadata::keyword("a", "A", "img").with_disabled(true),
            PluginMetadata::global("b", "B"),
        ]);

        let routed = router.route("img cat");
        assert_eq!(ids(&routed), vec!["b"]);
        assert_eq!(routed.entries[0].search, "img cat");
    }

    #[test]
    fn test_routing_is_deterministic() {
        let router = router(vec![
            PluginMetadata::global("b", "B"),
            PluginMetadata::global("c", "C"),
            PluginMetadata::global("a", "A"),
        ]);

        let first = ids(&router.route("cat")).join(",");
        for _ in 0..10 {
            assert_eq!(ids(&router.route("cat")).join(","), first);
        }
        assert_eq!(first, "b,c,a");
    }
}
