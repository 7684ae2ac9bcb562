//! Membership and delegation shared by groups and replicate sets

use crate::error::StoreResult;
use crate::hits::HitCollection;
use crate::reads::ReadsWithCounts;
use crate::stats::ReadSummary;
use crate::store::{HiCDataStore, SharedStore, StoreId};
use crate::types::{Chromosome, Genome, Probe};
use log::trace;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

#[derive(Debug, Default)]
struct MergedReads {
    chromosome: Option<String>,
    reads: Option<Arc<ReadsWithCounts>>,
}

/// Ordered member list with a one-slot merged read cache.
/// Every membership change clears the cache.
#[derive(Debug, Default)]
pub(crate) struct Members {
    stores: RwLock<Vec<SharedStore>>,
    cache: Mutex<MergedReads>,
}

impl Members {
    pub fn new(stores: Vec<SharedStore>) -> Self {
        let members = Self::default();
        members.replace(stores);
        members
    }

    pub fn snapshot(&self) -> Vec<SharedStore> {
        self.stores.read().clone()
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.stores.read().iter().any(|s| s.id() == id)
    }

    /// Returns false if the store was already a member
    pub fn add(&self, store: SharedStore) -> bool {
        {
            let mut stores = self.stores.write();
            if stores.iter().any(|s| s.id() == store.id()) {
                return false;
            }
            stores.push(store);
        }
        self.clear_cache();
        true
    }

    /// Returns false if the store was not a member
    pub fn remove(&self, id: StoreId) -> bool {
        let removed = {
            let mut stores = self.stores.write();
            let before = stores.len();
            stores.retain(|s| s.id() != id);
            stores.len() != before
        };
        if removed {
            self.clear_cache();
        }
        removed
    }

    /// Replaces the member list, dropping repeated ids
    pub fn replace(&self, stores: Vec<SharedStore>) {
        let mut unique: Vec<SharedStore> = Vec::with_capacity(stores.len());
        for store in stores {
            if !unique.iter().any(|s| s.id() == store.id()) {
                unique.push(store);
            }
        }
        *self.stores.write() = unique;
        self.clear_cache();
    }

    pub fn clear_cache(&self) {
        *self.cache.lock() = MergedReads::default();
    }

    pub fn summary(&self) -> StoreResult<ReadSummary> {
        self.snapshot()
            .iter()
            .try_fold(ReadSummary::default(), |acc, s| Ok(acc.combine(s.read_summary()?)))
    }

    pub fn read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        self.snapshot()
            .iter()
            .try_fold(0u64, |acc, s| Ok(acc + s.read_count_for_chromosome(chromosome)?))
    }

    pub fn reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>> {
        let mut cache = self.cache.lock();
        if cache.chromosome.as_deref() == Some(chromosome.name()) {
            if let Some(reads) = &cache.reads {
                return Ok(Arc::clone(reads));
            }
        }

        trace!("Merging member reads for {}", chromosome);
        let parts = self
            .snapshot()
            .iter()
            .map(|s| s.reads_for_chromosome(chromosome))
            .collect::<StoreResult<Vec<_>>>()?;
        let merged = Arc::new(ReadsWithCounts::merge(parts.iter().map(|p| p.as_ref())));

        cache.chromosome = Some(chromosome.name().to_string());
        cache.reads = Some(Arc::clone(&merged));
        Ok(merged)
    }

    pub fn reads_for_probe(&self, probe: &Probe) -> StoreResult<ReadsWithCounts> {
        let parts = self
            .snapshot()
            .iter()
            .map(|s| s.reads_for_probe(probe))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(ReadsWithCounts::merge(&parts))
    }

    pub fn read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        self.snapshot()
            .iter()
            .try_fold(0u64, |acc, s| Ok(acc + s.read_count_for_probe(probe)?))
    }

    /// Valid only when non-empty and every member is valid HiC data
    pub fn is_valid_hic(&self) -> bool {
        let stores = self.snapshot();
        !stores.is_empty() && stores.iter().all(|s| s.as_hic().is_some_and(|h| h.is_valid_hic()))
    }

    /// Union of a HiC query over every HiC-capable member, re-sorted
    pub fn union_hits<F>(&self, source: &str, mut fetch: F) -> StoreResult<HitCollection>
    where
        F: FnMut(&dyn HiCDataStore) -> StoreResult<HitCollection>,
    {
        let mut union = HitCollection::new(source);
        for store in self.snapshot() {
            if let Some(hic) = store.as_hic() {
                union.add_collection(&fetch(hic)?);
            }
        }
        union.sort();
        Ok(union)
    }

    pub fn hic_reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<HitCollection> {
        self.union_hits(chromosome.name(), |h| {
            h.hic_reads_for_chromosome(chromosome).map(|c| c.as_ref().clone())
        })
    }

    pub fn hic_reads_for_probe(&self, probe: &Probe) -> StoreResult<HitCollection> {
        self.union_hits(probe.chromosome().name(), |h| h.hic_reads_for_probe(probe))
    }

    pub fn exportable_reads_for_chromosome(&self, chromosome: &Chromosome, genome: &Genome) -> StoreResult<HitCollection> {
        self.union_hits(chromosome.name(), |h| h.exportable_reads_for_chromosome(chromosome, genome))
    }

    /// Sums `count` over the HiC-capable members
    pub fn sum_hic<F>(&self, count: F) -> u64
    where
        F: Fn(&dyn HiCDataStore) -> u64,
    {
        self.snapshot().iter().filter_map(|s| s.as_hic().map(&count)).sum()
    }

    pub fn try_sum_hic<F>(&self, count: F) -> StoreResult<u64>
    where
        F: Fn(&dyn HiCDataStore) -> StoreResult<u64>,
    {
        self.snapshot()
            .iter()
            .filter_map(|s| s.as_hic().map(&count))
            .try_fold(0u64, |acc, c| Ok(acc + c?))
    }

    /// Every member's value for the probe, in member order
    pub fn values_for_probe(&self, probe: &Probe) -> StoreResult<Vec<f32>> {
        self.snapshot().iter().map(|s| s.value_for_probe(probe)).collect()
    }

    pub fn all_have_value(&self, probe: &Probe) -> bool {
        self.snapshot().iter().all(|s| s.has_value_for_probe(probe))
    }
}
