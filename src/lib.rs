//! launcher-core: query dispatch and ranking for a quick launcher
//!
//! Routes keystrokes to search plugins, runs them concurrently, merges their
//! results into one ranked list and keeps stale work from overwriting
//! fresher results.

pub mod config;
pub mod error;
pub mod launcher;
pub mod matcher;
pub mod metrics;
pub mod plugins;
pub mod query;
pub mod ranking;
pub mod results;
pub mod search;
pub mod storage;

pub use config::Settings;
pub use error::{Error, Result};
pub use launcher::{ExecuteOutcome, Launcher, SelectedView};
pub use plugins::{Plugin, PluginMetadata, PluginRegistry};
pub use query::{Query, QueryRouter};
pub use results::{ResultAggregator, ResultItem, ResultsSnapshot};
pub use search::{DispatchOutcome, Dispatcher, QuerySession};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
