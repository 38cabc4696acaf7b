//! History and usage storage
//!
//! Holds executed queries, per-result selection counters and pinned results.
//! State is loaded once at startup and written back on an explicit save.

mod history;
mod persistence;
mod usage;

pub use history::{HistoryEntry, QueryHistory, DEFAULT_MAX_HISTORY};
pub use persistence::{JsonFileStore, MemoryStore, PersistedState, PersistenceProvider};
pub use usage::{TopMostRecord, UsageRecord, UserSelectedRecord};

use std::sync::Arc;
use tracing::{info, warn};

/// The launcher's persisted stores
#[derive(Debug)]
pub struct Stores {
    pub history: QueryHistory,
    pub usage: Arc<UserSelectedRecord>,
    pub top_most: Arc<TopMostRecord>,
}

impl Stores {
    pub fn empty(max_history: usize) -> Self {
        Self {
            history: QueryHistory::new(max_history),
            usage: Arc::new(UserSelectedRecord::new()),
            top_most: Arc::new(TopMostRecord::new()),
        }
    }

    pub fn from_state(state: PersistedState, max_history: usize) -> Self {
        Self {
            history: QueryHistory::from_entries(state.history, max_history),
            usage: Arc::new(UserSelectedRecord::from_records(state.usage)),
            top_most: Arc::new(TopMostRecord::from_identities(state.top_most)),
        }
    }

    /// Load from `provider`, falling back to empty stores on failure
    pub fn load(provider: &dyn PersistenceProvider, max_history: usize) -> Self {
        match provider.load() {
            Ok(state) => {
                let stores = Self::from_state(state, max_history);
                info!(
                    "Loaded {} history entries and {} usage counters",
                    stores.history.len(),
                    stores.usage.len()
                );
                stores
            }
            Err(e) => {
                warn!("Failed to load launcher state, starting empty: {}", e);
                Self::empty(max_history)
            }
        }
    }

    pub fn to_state(&self) -> PersistedState {
        PersistedState {
            history: self.history.entries(),
            usage: self.usage.to_records(),
            top_most: self.top_most.to_identities(),
        }
    }
}
