use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PreferencesError;

/// Tuning for the session store, read from `preferences.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorePreferences {
    /// Conversations kept live before the least recently used is evicted.
    pub max_active_sessions: usize,
    /// Queued commands per session actor.
    pub command_buffer: usize,
    /// Undelivered updates retained per subscriber.
    pub update_buffer: usize,
}

impl Default for StorePreferences {
    fn default() -> Self {
        Self {
            max_active_sessions: 16,
            command_buffer: 32,
            update_buffer: 256,
        }
    }
}

impl StorePreferences {
    /// Get the path to the preferences file
    pub fn config_path() -> Result<PathBuf, PreferencesError> {
        let config_dir = dirs::config_dir().ok_or(PreferencesError::NoConfigDir)?;
        Ok(config_dir.join("weave").join("preferences.toml"))
    }

    /// Load preferences from disk, or return defaults if not found
    pub fn load() -> Result<Self, PreferencesError> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, PreferencesError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        match toml::from_str(&contents) {
            Ok(prefs) => Ok(prefs),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse preferences file at {:?}: {}. Using defaults.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save preferences to disk
    pub fn save(&self) -> Result<(), PreferencesError> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PreferencesError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }
}
