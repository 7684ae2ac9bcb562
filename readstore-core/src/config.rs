//! Store configuration
//!
//! Loaded by front ends (for example from a `readstore.toml` file) and
//! handed to every store through a [`StoreContext`](crate::context::StoreContext).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound on chromosomes finalised at once, to avoid saturating disk I/O
pub const FINALIZE_CONCURRENCY_CAP: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for per-chromosome cache files
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Number of chromosomes finalised concurrently (capped at 6)
    #[serde(default = "default_max_concurrent_finalize")]
    pub max_concurrent_finalize: usize,

    /// zstd level for cache files
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    /// Verify xxh64 checksums when reloading cache files
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            max_concurrent_finalize: default_max_concurrent_finalize(),
            compression_level: default_compression_level(),
            verify_checksums: default_true(),
        }
    }
}

impl StoreConfig {
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_max_concurrent_finalize(mut self, workers: usize) -> Self {
        self.max_concurrent_finalize = workers;
        self
    }

    /// Worker count actually used, always between 1 and the cap
    pub fn finalize_workers(&self) -> usize {
        self.max_concurrent_finalize.clamp(1, FINALIZE_CONCURRENCY_CAP)
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_max_concurrent_finalize() -> usize {
    num_cpus::get().min(FINALIZE_CONCURRENCY_CAP)
}

fn default_compression_level() -> i32 {
    3
}

fn default_true() -> bool {
    true
}
