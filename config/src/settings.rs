//! Application settings management

use crate::PathManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Default cap on the number of threads loaded per user when listing.
pub const DEFAULT_USER_THREAD_LIMIT: u32 = 1000;

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// SQLite database file (defaults to the data dir)
    pub database_path: Option<PathBuf>,
    /// Root directory for element payloads
    pub storage_dir: Option<PathBuf>,
    /// Public URL prefix for stored payloads; `file://` URLs when unset
    pub storage_base_url: Option<String>,
    /// Maximum threads loaded per user when listing (0 means unlimited)
    #[serde(default = "default_thread_limit")]
    pub user_thread_limit: u32,
    /// Trace every data layer call at info level
    #[serde(default)]
    pub show_logger: bool,
}

fn default_thread_limit() -> u32 {
    DEFAULT_USER_THREAD_LIMIT
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: None,
            storage_dir: None,
            storage_base_url: None,
            user_thread_limit: DEFAULT_USER_THREAD_LIMIT,
            show_logger: false,
        }
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found.
    /// `THREADKEEP_*` environment variables override file values.
    pub fn load() -> Self {
        let from_file: Settings = PathManager::settings_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        from_file.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an environment lookup
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup("THREADKEEP_DATABASE_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup("THREADKEEP_STORAGE_DIR") {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = lookup("THREADKEEP_STORAGE_BASE_URL") {
            self.storage_base_url = Some(url);
        }
        if let Some(limit) = lookup("THREADKEEP_USER_THREAD_LIMIT").and_then(|v| v.parse().ok()) {
            self.user_thread_limit = limit;
        }
        if let Some(flag) = lookup("THREADKEEP_SHOW_LOGGER") {
            self.show_logger = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        self
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    /// Database path, falling back to the data directory
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(PathManager::db_path)
    }

    /// Storage root, falling back to the data directory
    pub fn resolved_storage_dir(&self) -> Option<PathBuf> {
        self.storage_dir.clone().or_else(PathManager::storage_dir)
    }

    /// Thread limit as an option, `None` meaning unlimited
    pub fn thread_limit(&self) -> Option<u32> {
        (self.user_thread_limit > 0).then_some(self.user_thread_limit)
    }
}
