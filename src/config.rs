//! Store and backend configuration.
//!
//! Both structs deserialize with serde, fill missing fields from
//! `Default`, and are checked with `validate()` before use.
//!
//! ```
//! use ticktape::config::FileBackendConfig;
//!
//! let config = FileBackendConfig::new("/var/lib/ticks");
//! assert_eq!(config.max_file_size, 10 << 20);
//! assert!(config.validate().is_ok());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Largest accepted `max_file_size` (1 GiB)
pub const MAX_FILE_SIZE_LIMIT: u64 = 1 << 30;

/// Default `max_file_size` (10 MiB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 << 20;

/// Default number of open file handles
pub const DEFAULT_MAX_OPEN_FILES: usize = 64;

/// Default block cache capacity
pub const DEFAULT_MAX_BUFS: usize = 1024;

// ============================================================================
// StoreConfig
// ============================================================================

/// Series store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of blocks resident in the cache, across all series
    pub max_bufs: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_bufs: DEFAULT_MAX_BUFS,
        }
    }
}

impl StoreConfig {
    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.max_bufs == 0 {
            return Err(StoreError::Config("max_bufs must be at least 1".into()));
        }
        Ok(())
    }
}

// ============================================================================
// FileBackendConfig
// ============================================================================

/// File backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Root directory for series and metadata files
    pub dir: PathBuf,

    /// Directory purged block files are moved to
    pub cold_dir: PathBuf,

    /// Target size of one block file, in bytes
    pub max_file_size: u64,

    /// Open file handle cache size
    pub max_open_files: usize,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

impl FileBackendConfig {
    /// Defaults rooted at `dir`, with `cold_dir` as `dir/cold`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            cold_dir: dir.join("cold"),
            dir,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_open_files: DEFAULT_MAX_OPEN_FILES,
        }
    }

    /// Check field ranges
    pub fn validate(&self) -> Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(StoreError::Config("dir must not be empty".into()));
        }
        if self.cold_dir.as_os_str().is_empty() {
            return Err(StoreError::Config("cold_dir must not be empty".into()));
        }
        if self.max_file_size == 0 || self.max_file_size > MAX_FILE_SIZE_LIMIT {
            return Err(StoreError::Config(format!(
                "max_file_size must be in 1..={}, got {}",
                MAX_FILE_SIZE_LIMIT, self.max_file_size
            )));
        }
        if self.max_open_files == 0 {
            return Err(StoreError::Config("max_open_files must be at least 1".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.max_bufs, DEFAULT_MAX_BUFS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_config_rejects_zero() {
        let config = StoreConfig { max_bufs: 0 };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert_eq!(err.code(), crate::error::EINVAL);
    }

    #[test]
    fn test_file_config_defaults() {
        let config = FileBackendConfig::new("/tmp/t");
        assert_eq!(config.cold_dir, PathBuf::from("/tmp/t/cold"));
        assert_eq!(config.max_open_files, DEFAULT_MAX_OPEN_FILES);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_config_bounds() {
        let mut config = FileBackendConfig::new("/tmp/t");
        config.max_file_size = 0;
        assert!(config.validate().is_err());
        config.max_file_size = MAX_FILE_SIZE_LIMIT + 1;
        assert!(config.validate().is_err());
        config.max_file_size = MAX_FILE_SIZE_LIMIT;
        assert!(config.validate().is_ok());
        config.max_open_files = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FileBackendConfig =
            serde_json::from_str(r#"{"dir": "/srv/ticks", "max_file_size": 4096}"#).unwrap();
        assert_eq!(config.dir, PathBuf::from("/srv/ticks"));
        assert_eq!(config.max_file_size, 4096);
        assert_eq!(config.max_open_files, DEFAULT_MAX_OPEN_FILES);

        let store: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(store, StoreConfig::default());
    }
}
