use std::path::PathBuf;
use std::sync::OnceLock;
use directories::BaseDirs;

static DATA_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

pub struct PathManager;

impl PathManager {
    /// Set a custom data directory (tests and containers without a home dir)
    pub fn set_data_dir(path: PathBuf) {
        let _ = DATA_DIR_OVERRIDE.set(path);
    }

    fn base_data_dir() -> Option<PathBuf> {
        if let Some(d) = DATA_DIR_OVERRIDE.get() {
            return Some(d.clone());
        }
        BaseDirs::new().map(|d| d.data_dir().join("threadkeep"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        Self::base_data_dir()
    }

    pub fn config_dir() -> Option<PathBuf> {
        if DATA_DIR_OVERRIDE.get().is_some() {
            return Self::data_dir();
        }
        BaseDirs::new().map(|d| d.config_dir().join("threadkeep"))
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("threadkeep.db"))
    }

    /// Root directory for element payloads written by the filesystem storage client
    pub fn storage_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("files"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }

    pub fn ensure_dirs_exist() -> std::io::Result<()> {
        if let Some(d) = Self::data_dir() {
            std::fs::create_dir_all(&d)?;
        }
        if let Some(d) = Self::config_dir() {
            std::fs::create_dir_all(&d)?;
        }
        if let Some(d) = Self::storage_dir() {
            std::fs::create_dir_all(&d)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_places_everything_under_data_dir() {
        let dir = std::env::temp_dir().join("threadkeep_paths_test");
        PathManager::set_data_dir(dir.clone());

        assert_eq!(PathManager::db_path(), Some(dir.join("threadkeep.db")));
        assert_eq!(PathManager::storage_dir(), Some(dir.join("files")));
        assert_eq!(PathManager::settings_path(), Some(dir.join("settings.toml")));
    }
}
