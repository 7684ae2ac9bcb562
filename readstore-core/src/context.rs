//! Shared state handed to stores in place of any process-wide singleton

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use log::{debug, trace};
use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
pub struct StoreContext {
    config: StoreConfig,
    finalize_pool: Mutex<Option<Arc<ThreadPool>>>,
    cache_loads: AtomicU64,
}

impl StoreContext {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            finalize_pool: Mutex::new(None),
            cache_loads: AtomicU64::new(0),
        }
    }

    pub fn shared(config: StoreConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn temp_dir(&self) -> &Path {
        &self.config.temp_dir
    }

    /// Bounded pool shared by every store finalised through this context
    pub fn finalize_pool(&self) -> StoreResult<Arc<ThreadPool>> {
        let mut slot = self.finalize_pool.lock();
        if let Some(pool) = slot.as_ref() {
            return Ok(Arc::clone(pool));
        }

        let workers = self.config.finalize_workers();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("readstore-finalize-{i}"))
            .build()
            .map_err(|e| StoreError::ThreadPool(e.to_string()))?;
        debug!("Started finalise pool with {} workers", workers);

        let pool = Arc::new(pool);
        *slot = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Records a reload of cached chromosome data from disk
    pub fn cache_used(&self) {
        let loads = self.cache_loads.fetch_add(1, Ordering::Relaxed) + 1;
        trace!("Cache load #{}", loads);
    }

    pub fn cache_loads(&self) -> u64 {
        self.cache_loads.load(Ordering::Relaxed)
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
