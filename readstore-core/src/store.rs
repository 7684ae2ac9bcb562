//! The data store contract shared by samples and aggregate views

use crate::error::StoreResult;
use crate::events::{DataChange, ListenerHub};
use crate::hits::HitCollection;
use crate::quant::QuantitationTable;
use crate::reads::ReadsWithCounts;
use crate::stats::ReadSummary;
use crate::types::{Chromosome, Genome, Probe};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique store identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreId(u64);

impl StoreId {
    pub fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    DataSet,
    PairedDataSet,
    Group,
    ReplicateSet,
}

impl StoreKind {
    /// Stores that own primary read data
    pub fn is_sample(self) -> bool {
        matches!(self, StoreKind::DataSet | StoreKind::PairedDataSet)
    }
}

/// Identity, name, quantitation and the weak link back to the registry hub
#[derive(Debug)]
pub struct StoreCore {
    id: StoreId,
    name: RwLock<String>,
    quantitation: QuantitationTable,
    hub: RwLock<Weak<ListenerHub>>,
}

impl StoreCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StoreId::next(),
            name: RwLock::new(name.into()),
            quantitation: QuantitationTable::default(),
            hub: RwLock::new(Weak::new()),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.write() = name.to_string();
        self.notify(&DataChange::StoreRenamed(self.id));
    }

    pub fn quantitation(&self) -> &QuantitationTable {
        &self.quantitation
    }

    pub fn attach(&self, hub: &Arc<ListenerHub>) {
        *self.hub.write() = Arc::downgrade(hub);
    }

    pub fn detach(&self) {
        *self.hub.write() = Weak::new();
    }

    /// Sends a change to the registry's listeners if still attached
    pub fn notify(&self, change: &DataChange) {
        let hub = self.hub.read().upgrade();
        if let Some(hub) = hub {
            hub.notify(change);
        }
    }
}

pub trait DataStore: Send + Sync + fmt::Debug {
    fn core(&self) -> &StoreCore;

    fn kind(&self) -> StoreKind;

    fn id(&self) -> StoreId {
        self.core().id()
    }

    fn name(&self) -> String {
        self.core().name()
    }

    fn set_name(&self, name: &str) {
        self.core().set_name(name)
    }

    fn is_finalized(&self) -> bool;

    /// Converts buffered data into its queryable form. Repeat calls are a no-op.
    fn finalize(&self) -> StoreResult<()>;

    fn read_summary(&self) -> StoreResult<ReadSummary>;

    fn total_read_count(&self) -> StoreResult<u64> {
        Ok(self.read_summary()?.total)
    }

    fn forward_read_count(&self) -> StoreResult<u64> {
        Ok(self.read_summary()?.forward)
    }

    fn reverse_read_count(&self) -> StoreResult<u64> {
        Ok(self.read_summary()?.reverse)
    }

    fn unknown_read_count(&self) -> StoreResult<u64> {
        Ok(self.read_summary()?.unknown)
    }

    fn total_read_length(&self) -> StoreResult<u64> {
        Ok(self.read_summary()?.total_length)
    }

    fn max_read_length(&self) -> StoreResult<u32> {
        Ok(self.read_summary()?.max_length)
    }

    fn min_read_length(&self) -> StoreResult<u32> {
        Ok(self.read_summary()?.min_length)
    }

    /// Sorted reads for a chromosome, empty if it has no data
    fn reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>>;

    fn read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64>;

    /// Sorted reads overlapping the probe
    fn reads_for_probe(&self, probe: &Probe) -> StoreResult<ReadsWithCounts>;

    fn read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        Ok(self.reads_for_probe(probe)?.total_count())
    }

    fn contains_read_for_probe(&self, probe: &Probe) -> StoreResult<bool> {
        Ok(!self.reads_for_probe(probe)?.is_empty())
    }

    /// HiC view of this store, present only when it holds valid pair data
    fn as_hic(&self) -> Option<&dyn HiCDataStore> {
        None
    }

    fn set_value_for_probe(&self, probe: &Probe, value: f32) -> StoreResult<()> {
        self.core().quantitation().set_value(probe.index(), value)
    }

    fn value_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        self.core().quantitation().value(probe.index(), &self.name())
    }

    fn has_value_for_probe(&self, probe: &Probe) -> bool {
        self.core().quantitation().has_value(probe.index())
    }

    fn is_quantitated(&self) -> bool {
        self.core().quantitation().is_quantitated()
    }

    fn null_value(&self) -> f32 {
        self.core().quantitation().null_value()
    }

    fn probe_set_replaced(&self, probe_count: usize) {
        self.core().quantitation().probe_set_replaced(probe_count)
    }

    /// Releases cache files. Called when the store leaves the registry.
    fn dispose(&self) {}
}

pub type SharedStore = Arc<dyn DataStore>;

/// Paired-read (HiC) capability
pub trait HiCDataStore: Send + Sync {
    fn is_valid_hic(&self) -> bool;

    /// Interactions whose source read overlaps the probe
    fn hic_reads_for_probe(&self, probe: &Probe) -> StoreResult<HitCollection>;

    fn hic_reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<HitCollection>>;

    /// Each interaction on this chromosome once, for export
    fn exportable_reads_for_chromosome(&self, chromosome: &Chromosome, genome: &Genome) -> StoreResult<HitCollection>;

    fn hic_read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        Ok(self.hic_reads_for_probe(probe)?.pair_count() as u64)
    }

    fn hic_read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        Ok(self.hic_reads_for_chromosome(chromosome)?.pair_count() as u64)
    }

    fn cis_count(&self) -> u64;

    fn trans_count(&self) -> u64;

    fn cis_count_for_chromosome(&self, chromosome: &Chromosome) -> u64;

    fn trans_count_for_chromosome(&self, chromosome: &Chromosome) -> u64;

    fn total_pair_count(&self) -> u64 {
        (self.cis_count() + self.trans_count()) / 2
    }

    /// Mean distance correction factor over the buckets spanning `min_distance..=max_distance`
    fn correction_for_length(&self, chromosome: &Chromosome, min_distance: u32, max_distance: u32) -> StoreResult<f32>;
}
