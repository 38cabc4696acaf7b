//! Settings structures for launcher configuration

use crate::error::{Error, Result};
use crate::matcher::SearchPrecision;
use crate::storage::DEFAULT_MAX_HISTORY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings structure, loaded from `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub search: SearchSettings,
    pub storage: StorageSettings,
    /// Per-plugin overrides of keyword binding and disabled state
    pub plugins: Vec<PluginConfig>,
    /// In-memory catalogs served by the demo binary
    pub catalogs: Vec<CatalogConfig>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Merge with environment variables (LAUNCHER_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("LAUNCHER_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("LAUNCHER_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("LAUNCHER_MAX_RESULTS") {
            match val.parse::<usize>() {
                Ok(max) if max > 0 => self.search.max_results_to_show = max,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("LAUNCHER_DEBOUNCE_MS") {
            if let Ok(ms) = val.parse() {
                self.search.debounce_ms = ms;
            }
        }
    }

    /// Reject settings the launcher cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.search.max_results_to_show == 0 {
            return Err(Error::Config(
                "search.max_results_to_show must be at least 1".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for plugin in &self.plugins {
            if plugin.id.is_empty() {
                return Err(Error::Config("plugin override without id".to_string()));
            }
            if !seen.insert(plugin.id.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate plugin override: {}",
                    plugin.id
                )));
            }
        }
        Ok(())
    }

    /// Get the override for a plugin id
    pub fn get_plugin(&self, id: &str) -> Option<&PluginConfig> {
        self.plugins.iter().find(|p| p.id == id)
    }
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
}

/// What the input box shows when the launcher is summoned
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastQueryMode {
    /// Start with an empty query
    Empty,
    /// Keep the last query as typed
    #[default]
    Preserved,
    /// Keep the last query, fully selected
    Selected,
}

/// Search behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Number of results visible at once; also the page size for navigation
    pub max_results_to_show: usize,
    /// History cap
    pub max_history_items: usize,
    pub last_query_mode: LastQueryMode,
    /// Delay before dispatching, to coalesce fast typing
    pub debounce_ms: u64,
    /// Upper bound on waiting for the fast wave before a partial update
    pub fast_wave_timeout_ms: Option<u64>,
    /// Acceptance threshold for fuzzy matching
    pub search_precision: SearchPrecision,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results_to_show: 4,
            max_history_items: DEFAULT_MAX_HISTORY,
            last_query_mode: LastQueryMode::default(),
            debounce_ms: 20,
            fast_wave_timeout_ms: None,
            search_precision: SearchPrecision::default(),
        }
    }
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn fast_wave_timeout(&self) -> Option<Duration> {
        self.fast_wave_timeout_ms.map(Duration::from_millis)
    }
}

/// Where history and usage state is stored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory for the JSON state files; platform data dir when unset
    pub data_dir: Option<PathBuf>,
}

/// Override for a registered plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Plugin id (unique identifier)
    pub id: String,
    /// Action keyword, `*` for a global plugin
    pub action_keyword: Option<String>,
    pub disabled: bool,
}

/// A static list of entries served as a plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub id: String,
    pub name: String,
    /// Action keyword, `*` for a global catalog
    pub action_keyword: String,
    /// Serve matches from the delayed wave as well
    pub delayed: bool,
    pub entries: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    pub title: String,
    pub subtitle: String,
    pub score: i64,
}
