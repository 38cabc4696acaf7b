//! Plugin registry for managing statically registered plugins

use super::traits::{KeywordBinding, Plugin, PluginMetadata};
use crate::config::PluginConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A plugin together with its effective metadata
#[derive(Clone)]
pub struct RegisteredPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub metadata: PluginMetadata,
}

impl RegisteredPlugin {
    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Registry of all plugins supplied by the host
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Plugins in registration order
    plugins: Vec<RegisteredPlugin>,
    /// Plugin index by id
    by_id: HashMap<String, usize>,
    /// Action keywords, longest first
    keywords: Vec<(String, usize)>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin with its own metadata
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) -> bool {
        self.register_with_config(plugin, None)
    }

    /// Register a plugin, applying a settings override if present.
    ///
    /// Returns `false` if a plugin with the same id is already registered.
    pub fn register_with_config(
        &mut self,
        plugin: Arc<dyn Plugin>,
        config: Option<&PluginConfig>,
    ) -> bool {
        let mut metadata = plugin.metadata();
        if let Some(config) = config {
            if let Some(ref keyword) = config.action_keyword {
                metadata.binding = KeywordBinding::parse(keyword);
            }
            metadata.disabled |= config.disabled;
        }

        if self.by_id.contains_key(&metadata.id) {
            warn!("Plugin {} is already registered, skipping", metadata.id);
            return false;
        }

        let index = self.plugins.len();
        if let KeywordBinding::Keyword(ref keyword) = metadata.binding {
            if self.keywords.iter().any(|(k, _)| k == keyword) {
                warn!(
                    "Action keyword '{}' of {} is already taken, plugin will not be reachable",
                    keyword, metadata.id
                );
            } else {
                self.keywords.push((keyword.clone(), index));
                // Stable, so equal lengths keep registration order
                self.keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
            }
        }

        info!(
            "Registered plugin {} ({}){}",
            metadata.id,
            metadata.binding,
            if metadata.disabled { " [disabled]" } else { "" }
        );
        self.by_id.insert(metadata.id.clone(), index);
        self.plugins.push(RegisteredPlugin { plugin, metadata });
        true
    }

    /// Get a plugin by id
    pub fn get(&self, id: &str) -> Option<&RegisteredPlugin> {
        self.by_id.get(id).map(|&i| &self.plugins[i])
    }

    /// All plugins in registration order
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.plugins.iter()
    }

    /// Enabled global plugins in registration order
    pub fn global_plugins(&self) -> impl Iterator<Item = &RegisteredPlugin> {
        self.plugins
            .iter()
            .filter(|p| p.metadata.binding.is_global() && !p.metadata.disabled)
    }

    /// Keyword-bound plugins with their keyword, longest keyword first
    pub fn keyword_plugins(&self) -> impl Iterator<Item = (&str, &RegisteredPlugin)> {
        self.keywords
            .iter()
            .map(|(keyword, i)| (keyword.as_str(), &self.plugins[*i]))
    }

    /// Check if a plugin exists
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Get number of registered plugins
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;
    use crate::results::ResultItem;

    struct Named(PluginMetadata);

    impl Plugin for Named {
        fn metadata(&self) -> PluginMetadata {
            self.0.clone()
        }

        fn query(&self, _query: &Query) -> anyhow::Result<Vec<ResultItem>> {
            Ok(Vec::new())
        }
    }

    fn plugin(metadata: PluginMetadata) -> Arc<dyn Plugin> {
        Arc::new(Named(metadata))
    }

    #[test]
    fn test_registry() {
        let mut registry = PluginRegistry::new();
        registry.register(plugin(PluginMetadata::global("b", "B")));
        registry.register(plugin(PluginMetadata::keyword("a", "A", "img")));

        assert!(registry.contains("a"));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.global_plugins().count(), 1);
        assert_eq!(
            registry.keyword_plugins().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["img"]
        );
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(plugin(PluginMetadata::global("b", "B"))));
        assert!(!registry.register(plugin(PluginMetadata::global("b", "B2"))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_config_override() {
        let mut registry = PluginRegistry::new();
        let config = PluginConfig {
            id: "b".to_string(),
            action_keyword: Some("bb".to_string()),
            disabled: true,
        };
        registry.register_with_config(plugin(PluginMetadata::global("b", "B")), Some(&config));

        let registered = registry.get("b").unwrap();
        assert_eq!(registered.metadata.binding.keyword(), Some("bb"));
        assert!(registered.metadata.disabled);
    }

    #[test]
    fn test_keywords_longest_first() {
        let mut registry = PluginRegistry::new();
        registry.register(plugin(PluginMetadata::keyword("short", "S", "g")));
        registry.register(plugin(PluginMetadata::keyword("long", "L", "gh")));

        let keywords: Vec<_> = registry.keyword_plugins().map(|(k, _)| k).collect();
        assert_eq!(keywords, vec!["gh", "g"]);
    }
}
