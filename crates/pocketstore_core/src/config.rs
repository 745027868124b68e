//! Runtime configuration for opening the three stores.
//!
//! # Invariants
//! - `data_dir = None` means every store is in-memory and lost on exit.
//! - File names inside `data_dir` are fixed so reopening finds prior data.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that selects the on-disk data directory.
pub const DATA_DIR_ENV: &str = "POCKETSTORE_DATA_DIR";

pub const ASYNC_STORE_FILE_NAME: &str = "async_store.sqlite3";
pub const CACHE_FILE_NAME: &str = "kv_cache.sqlite3";
pub const OBJECT_STORE_FILE_NAME: &str = "objects.sqlite3";

/// Where the stores keep their data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// In-memory configuration, used by tests and the CLI demo.
    pub fn in_memory() -> Self {
        Self { data_dir: None }
    }

    /// Configuration rooted at `dir`.
    pub fn with_data_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
        }
    }

    /// Reads [`DATA_DIR_ENV`]; blank or unset falls back to in-memory.
    pub fn from_env() -> Self {
        let data_dir = std::env::var(DATA_DIR_ENV)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);
        Self { data_dir }
    }

    pub fn async_store_path(&self) -> Option<PathBuf> {
        self.file_path(ASYNC_STORE_FILE_NAME)
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        self.file_path(CACHE_FILE_NAME)
    }

    pub fn object_store_path(&self) -> Option<PathBuf> {
        self.file_path(OBJECT_STORE_FILE_NAME)
    }

    fn file_path(&self, name: &str) -> Option<PathBuf> {
        self.data_dir.as_deref().map(|dir: &Path| dir.join(name))
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use std::path::PathBuf;

    #[test]
    fn in_memory_config_has_no_paths() {
        let config = AppConfig::in_memory();
        assert!(config.async_store_path().is_none());
        assert!(config.cache_path().is_none());
        assert!(config.object_store_path().is_none());
    }

    #[test]
    fn data_dir_config_places_each_store_in_its_own_file() {
        let config = AppConfig::with_data_dir("/data/app");
        assert_eq!(
            config.async_store_path(),
            Some(PathBuf::from("/data/app/async_store.sqlite3"))
        );
        assert_eq!(
            config.cache_path(),
            Some(PathBuf::from("/data/app/kv_cache.sqlite3"))
        );
        assert_eq!(
            config.object_store_path(),
            Some(PathBuf::from("/data/app/objects.sqlite3"))
        );
    }
}
