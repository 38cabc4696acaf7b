//! Persistence providers for history and usage state

use super::history::HistoryEntry;
use super::usage::UsageRecord;
use crate::error::{Error, Result};
use crate::results::ResultIdentity;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

const HISTORY_FILE: &str = "history.json";
const USAGE_FILE: &str = "user_selected_record.json";
const TOP_MOST_FILE: &str = "top_most_record.json";

/// Everything the launcher persists between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub history: Vec<HistoryEntry>,
    pub usage: Vec<UsageRecord>,
    pub top_most: Vec<ResultIdentity>,
}

/// Loads and saves [`PersistedState`]; the representation is up to the implementor
pub trait PersistenceProvider: Send + Sync {
    fn load(&self) -> Result<PersistedState>;

    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Stores each part of the state as a JSON file in one directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir()
            .ok_or_else(|| Error::Persistence("no data directory available".to_string()))?;
        Ok(Self::new(dir.join("launcher-core")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        if !path.exists() {
            debug!("No {} found, starting empty", path.display());
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl PersistenceProvider for JsonFileStore {
    fn load(&self) -> Result<PersistedState> {
        Ok(PersistedState {
            history: self.read(HISTORY_FILE)?,
            usage: self.read(USAGE_FILE)?,
            top_most: self.read(TOP_MOST_FILE)?,
        })
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        self.write(HISTORY_FILE, &state.history)?;
        self.write(USAGE_FILE, &state.usage)?;
        self.write(TOP_MOST_FILE, &state.top_most)?;
        debug!("Saved launcher state to {}", self.dir.display());
        Ok(())
    }
}

/// Keeps state in memory; used by tests and hosts without a disk
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> PersistedState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl PersistenceProvider for MemoryStore {
    fn load(&self) -> Result<PersistedState> {
        Ok(self.state())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        Ok(())
    }
}
