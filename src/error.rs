//! Error types for the launcher core

use thiserror::Error;

/// Errors surfaced by the launcher core.
///
/// None of these are fatal to the dispatch path: plugin failures are
/// contained per plugin and persistence failures fall back to empty state.
#[derive(Debug, Error)]
pub enum Error {
    /// A plugin returned an error or panicked during a query
    #[error("plugin {plugin} failed: {message}")]
    PluginFailure { plugin: String, message: String },

    /// Loading or saving history/usage state failed
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Invalid settings
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn plugin(plugin: impl Into<String>, message: impl ToString) -> Self {
        Self::PluginFailure {
            plugin: plugin.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
