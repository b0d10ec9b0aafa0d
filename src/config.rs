use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::core::Result;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Buffer pool capacity, in pages
    #[serde(default = "default_buffer_pool_pages")]
    pub buffer_pool_pages: usize,
    /// How long a page lock request may wait before the transaction aborts
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

const fn default_buffer_pool_pages() -> usize {
    50
}

const fn default_lock_timeout_ms() -> u64 {
    2000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            buffer_pool_pages: default_buffer_pool_pages(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl EngineConfig {
    /// Load configuration with priority: ENV > config file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // 1. Optional config file (format chosen by extension)
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
            tracing::debug!(path = %path.display(), "loading engine config");
        }

        // 2. Environment variables (HEAPQL_DATA_DIR, HEAPQL_BUFFER_POOL_PAGES, ...)
        builder = builder.add_source(Environment::with_prefix("HEAPQL").try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Location of the catalog file inside `data_dir`
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.buffer_pool_pages, 50);
        assert_eq!(config.lock_timeout(), Duration::from_secs(2));
        assert_eq!(config.catalog_path(), PathBuf::from("./data/catalog.json"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("heapql.toml");
        std::fs::write(&path, "data_dir = \"/var/lib/heapql\"\nbuffer_pool_pages = 8\n").unwrap();

        let config = EngineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/heapql"));
        assert_eq!(config.buffer_pool_pages, 8);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        assert!(EngineConfig::load(Some(&path)).is_err());
    }
}
