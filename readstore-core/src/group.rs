//! Pooled view over single-sample stores

use crate::aggregate::Members;
use crate::error::{StoreError, StoreResult};
use crate::events::DataChange;
use crate::hits::HitCollection;
use crate::reads::ReadsWithCounts;
use crate::stats::ReadSummary;
use crate::store::{DataStore, HiCDataStore, SharedStore, StoreCore, StoreKind};
use crate::types::{Chromosome, Genome, Probe};
use std::sync::Arc;

/// Reads from several samples pooled as if they were one.
///
/// A group holds its own quantitation. Probes it has no value for fall
/// back to the mean of its members.
#[derive(Debug)]
pub struct DataGroup {
    core: StoreCore,
    members: Members,
}

impl DataGroup {
    pub fn new(name: impl Into<String>, members: Vec<SharedStore>) -> StoreResult<Self> {
        let name = name.into();
        for member in &members {
            check_member(member)?;
        }
        Ok(Self { core: StoreCore::new(name), members: Members::new(members) })
    }

    pub fn members(&self) -> Vec<SharedStore> {
        self.members.snapshot()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, store: &SharedStore) -> bool {
        self.members.contains(store.id())
    }

    pub fn add_member(&self, store: SharedStore) -> StoreResult<()> {
        check_member(&store)?;
        if self.members.add(store) {
            self.members_changed();
        }
        Ok(())
    }

    pub fn remove_member(&self, store: &SharedStore) {
        if self.members.remove(store.id()) {
            self.members_changed();
        }
    }

    pub fn set_members(&self, stores: Vec<SharedStore>) -> StoreResult<()> {
        for store in &stores {
            check_member(store)?;
        }
        self.members.replace(stores);
        self.members_changed();
        Ok(())
    }

    /// Value stored on the group itself. Unset slots hold NaN.
    fn own_value(&self, probe: &Probe) -> Option<f32> {
        let table = self.core.quantitation();
        if !table.has_value(probe.index()) {
            return None;
        }
        table.value(probe.index(), &self.name()).ok().filter(|v| !v.is_nan())
    }

    fn members_changed(&self) {
        self.core.notify(&DataChange::GroupMembersChanged(self.id()));
    }
}

fn check_member(store: &SharedStore) -> StoreResult<()> {
    if store.kind().is_sample() {
        Ok(())
    } else {
        Err(StoreError::InvalidMember { store: store.name(), reason: "groups can only hold data sets" })
    }
}

impl DataStore for DataGroup {
    fn core(&self) -> &StoreCore {
        &self.core
    }

    fn kind(&self) -> StoreKind {
        StoreKind::Group
    }

    fn is_finalized(&self) -> bool {
        self.members.snapshot().iter().all(|s| s.is_finalized())
    }

    fn finalize(&self) -> StoreResult<()> {
        for member in self.members.snapshot() {
            member.finalize()?;
        }
        Ok(())
    }

    fn read_summary(&self) -> StoreResult<ReadSummary> {
        self.members.summary()
    }

    fn reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<ReadsWithCounts>> {
        self.members.reads_for_chromosome(chromosome)
    }

    fn read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        self.members.read_count_for_chromosome(chromosome)
    }

    fn reads_for_probe(&self, probe: &Probe) -> StoreResult<ReadsWithCounts> {
        self.members.reads_for_probe(probe)
    }

    fn read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        self.members.read_count_for_probe(probe)
    }

    fn as_hic(&self) -> Option<&dyn HiCDataStore> {
        self.members.is_valid_hic().then_some(self as &dyn HiCDataStore)
    }

    fn value_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        if let Some(value) = self.own_value(probe) {
            return Ok(value);
        }
        if self.members.is_empty() || !self.members.all_have_value(probe) {
            return Err(StoreError::NoQuantitation(self.name()));
        }
        let values = self.members.values_for_probe(probe)?;
        Ok(values.iter().sum::<f32>() / values.len() as f32)
    }

    fn has_value_for_probe(&self, probe: &Probe) -> bool {
        self.own_value(probe).is_some()
            || (!self.members.is_empty() && self.members.all_have_value(probe))
    }

    fn is_quantitated(&self) -> bool {
        !self.members.is_empty()
            && (self.core.quantitation().is_quantitated()
                || self.members.snapshot().iter().all(|s| s.is_quantitated()))
    }
}

impl HiCDataStore for DataGroup {
    fn is_valid_hic(&self) -> bool {
        self.members.is_valid_hic()
    }

    fn hic_reads_for_probe(&self, probe: &Probe) -> StoreResult<HitCollection> {
        self.members.hic_reads_for_probe(probe)
    }

    fn hic_reads_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<Arc<HitCollection>> {
        self.members.hic_reads_for_chromosome(chromosome).map(Arc::new)
    }

    fn exportable_reads_for_chromosome(&self, chromosome: &Chromosome, genome: &Genome) -> StoreResult<HitCollection> {
        self.members.exportable_reads_for_chromosome(chromosome, genome)
    }

    fn hic_read_count_for_probe(&self, probe: &Probe) -> StoreResult<u64> {
        self.members.try_sum_hic(|h| h.hic_read_count_for_probe(probe))
    }

    fn hic_read_count_for_chromosome(&self, chromosome: &Chromosome) -> StoreResult<u64> {
        self.members.try_sum_hic(|h| h.hic_read_count_for_chromosome(chromosome))
    }

    fn cis_count(&self) -> u64 {
        self.members.sum_hic(|h| h.cis_count())
    }

    fn trans_count(&self) -> u64 {
        self.members.sum_hic(|h| h.trans_count())
    }

    fn cis_count_for_chromosome(&self, chromosome: &Chromosome) -> u64 {
        self.members.sum_hic(|h| h.cis_count_for_chromosome(chromosome))
    }

    fn trans_count_for_chromosome(&self, chromosome: &Chromosome) -> u64 {
        self.members.sum_hic(|h| h.trans_count_for_chromosome(chromosome))
    }

    fn total_pair_count(&self) -> u64 {
        self.total_read_count().unwrap_or(0) / 2
    }

    /// Geometric mean of the members' factors. This is an approximation,
    /// there is no pooled distance model behind it.
    fn correction_for_length(&self, chromosome: &Chromosome, min_distance: u32, max_distance: u32) -> StoreResult<f32> {
        let mut factors = Vec::new();
        for member in self.members.snapshot() {
            if let Some(hic) = member.as_hic() {
                factors.push(hic.correction_for_length(chromosome, min_distance, max_distance)?);
            }
        }
        if factors.is_empty() {
            return Ok(0.0);
        }
        let log_sum: f64 = factors.iter().map(|&f| (f as f64).log10()).sum();
        Ok(10f64.powf(log_sum / factors.len() as f64) as f32)
    }
}
