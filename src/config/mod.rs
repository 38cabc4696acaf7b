//! Configuration module for the launcher
//!
//! Handles loading and validating settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use crate::error::Result;
use std::path::PathBuf;
use tracing::info;

/// Locate and load settings.
///
/// `LAUNCHER_SETTINGS_PATH` wins, then `settings.yml`, `config/settings.yml`
/// and the user config directory; defaults are used when none exists.
/// Environment overrides are applied in every case.
pub fn load() -> Result<Settings> {
    if let Ok(path) = std::env::var("LAUNCHER_SETTINGS_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            return load_from(path);
        }
    }

    let paths = [
        Some(PathBuf::from("settings.yml")),
        Some(PathBuf::from("config/settings.yml")),
        dirs::config_dir().map(|p| p.join("launcher-core/settings.yml")),
    ];
    for path in paths.into_iter().flatten() {
        if path.exists() {
            return load_from(path);
        }
    }

    info!("No settings file found, using defaults");
    let mut settings = Settings::default();
    settings.merge_env();
    Ok(settings)
}

fn load_from(path: PathBuf) -> Result<Settings> {
    info!("Loading settings from: {}", path.display());
    let mut settings = Settings::from_file(&path)?;
    settings.merge_env();
    Ok(settings)
}
