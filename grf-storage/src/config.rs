//! Storage configuration envelope

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Entry-count bound of the content cache.
    pub max_entries: usize,
    /// Byte budget of the content cache, in MiB.
    #[serde(rename = "maxMemoryMB")]
    pub max_memory_mb: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            max_memory_mb: 256,
        }
    }
}

/// Physical mirror settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Write fetched bytes to a physical mirror on disk.
    pub enabled: bool,
}

/// All recognized configuration keys. Every field has a default, so an
/// empty document is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub cache: CacheConfig,
    /// Fraction of invalid-UTF-8 names above which CP949 is selected.
    pub auto_detect_threshold: f64,
    pub extract: ExtractConfig,
    /// Cap on entries inspected during encoding auto-detection (0 = all).
    pub scan_limit: usize,
    /// Mirror root when extraction is enabled.
    pub mirror_dir: Option<PathBuf>,
    /// Repair mapping location; defaults to `path-mapping.json` next to
    /// the manifest.
    pub repair_map_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            auto_detect_threshold: 0.01,
            extract: ExtractConfig::default(),
            scan_limit: 0,
            mirror_dir: None,
            repair_map_path: None,
        }
    }
}

impl StorageConfig {
    pub fn cache_max_bytes(&self) -> usize {
        self.cache.max_memory_mb * 1024 * 1024
    }
}
