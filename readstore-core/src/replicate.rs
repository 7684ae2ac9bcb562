//! Replicate sets: biological replicates summarised per probe

use crate::aggregate::Members;
use crate::error::{StoreError, StoreResult};
use crate::events::DataChange;
use crate::hits::HitCollection;
use crate::reads::ReadsWithCounts;
use crate::stats::{self, ReadSummary};
use crate::store::{DataStore, HiCDataStore, SharedStore, StoreCore, StoreKind};
use crate::types::{Chromosome, Genome, Probe};
use std::sync::Arc;

/// A set of stores treated as replicates of one condition.
///
/// Holds no values of its own: a probe's value is the mean of the members'
/// values and is only defined when every member has one. Members can be
/// data sets, paired data sets or groups, never another replicate set.
#[derive(Debug)]
pub struct ReplicateSet {
    core: StoreCore,
    members: Members,
}

impl ReplicateSet {
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

    fn members_changed(&self) {
        self.core.notify(&DataChange::ReplicateSetMembersChanged(self.id()));
    }

    fn require_values(&self, probe: &Probe) -> StoreResult<()> {
        if self.has_value_for_probe(probe) {
            Ok(())
        } else {
            Err(StoreError::NoQuantitation(self.name()))
        }
    }

    /// Mean over the members whose value is not NaN. NaN if none are measured.
    pub fn value_for_probe_excluding_unmeasured(&self, probe: &Probe) -> StoreResult<f32> {
        self.require_values(probe)?;
        if self.members.is_empty() {
            return Ok(0.0);
        }
        let measured: Vec<f32> = self
            .members
            .values_for_probe(probe)?
            .into_iter()
            .filter(|v| !v.is_nan())
            .collect();
        if measured.is_empty() {
            return Ok(f32::NAN);
        }
        Ok(measured.iter().sum::<f32>() / measured.len() as f32)
    }

    /// Member values in member order
    pub fn values_for_probe(&self, probe: &Probe) -> StoreResult<Vec<f32>> {
        self.members.values_for_probe(probe)
    }

    pub fn stdev_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        Ok(stats::stdev(&self.values_for_probe(probe)?))
    }

    pub fn sem_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        Ok(stats::sem(&self.values_for_probe(probe)?))
    }

    /// Standard deviation relative to [`DataStore::value_for_probe`]
    pub fn coefficient_of_variation_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        let values = self.values_for_probe(probe)?;
        Ok(stats::stdev(&values) / self.value_for_probe(probe)?)
    }

    pub fn quartile_coefficient_of_dispersion_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        Ok(stats::quartile_coefficient_of_dispersion(&self.values_for_probe(probe)?))
    }

    /// Members whose value is their own null sentinel
    pub fn unmeasured_count_for_probe(&self, probe: &Probe) -> StoreResult<usize> {
        let mut unmeasured = 0;
        for member in self.members.snapshot() {
            let value = member.value_for_probe(probe)?;
            let null = member.null_value();
            if value == null || (value.is_nan() && null.is_nan()) {
                unmeasured += 1;
            }
        }
        Ok(unmeasured)
    }
}

fn check_member(store: &SharedStore) -> StoreResult<()> {
    if store.kind() == StoreKind::ReplicateSet {
        Err(StoreError::NestedReplicateSet(store.name()))
    } else {
        Ok(())
    }
}

impl DataStore for ReplicateSet {
    fn core(&self) -> &StoreCore {
        &self.core
    }

    fn kind(&self) -> StoreKind {
        StoreKind::ReplicateSet
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

    fn set_value_for_probe(&self, _probe: &Probe, _value: f32) -> StoreResult<()> {
        Err(StoreError::ReplicateSetValue(self.name()))
    }

    fn value_for_probe(&self, probe: &Probe) -> StoreResult<f32> {
        self.require_values(probe)?;
        if self.members.is_empty() {
            return Ok(0.0);
        }
        let values = self.members.values_for_probe(probe)?;
        Ok(values.iter().sum::<f32>() / values.len() as f32)
    }

    fn has_value_for_probe(&self, probe: &Probe) -> bool {
        self.members.all_have_value(probe)
    }

    fn is_quantitated(&self) -> bool {
        let members = self.members.snapshot();
        !members.is_empty() && members.iter().all(|s| s.is_quantitated())
    }
}

impl HiCDataStore for ReplicateSet {
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

    fn correction_for_length(&self, _chromosome: &Chromosome, _min_distance: u32, _max_distance: u32) -> StoreResult<f32> {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::testing::FixedStore;
    use crate::read::PackedRead;
    use crate::types::Strand;

    fn probe(index: usize) -> Probe {
        Probe::new(Arc::new(Chromosome::new("1", 1000)), PackedRead::new(1, 100, Strand::Unknown), index)
    }

    fn quantitated(name: &str, values: &[f32]) -> SharedStore {
        let store = FixedStore::new(name, StoreKind::DataSet).shared();
        store.probe_set_replaced(values.len());
        for (i, &v) in values.iter().enumerate() {
            store.set_value_for_probe(&probe(i), v).unwrap();
        }
        store
    }

    #[test]
    fn test_rejects_nesting() {
        let inner = FixedStore::new("inner", StoreKind::ReplicateSet).shared();
        assert!(matches!(
            ReplicateSet::new("outer", vec![Arc::clone(&inner)]),
            Err(StoreError::NestedReplicateSet(_))
        ));

        let set = ReplicateSet::new("outer", Vec::new()).unwrap();
        assert!(set.add_member(inner).is_err());
        let group = FixedStore::new("group", StoreKind::Group).shared();
        set.add_member(group).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_values_cannot_be_set() {
        let set = ReplicateSet::new("r", vec![quantitated("a", &[1.0])]).unwrap();
        assert!(matches!(set.set_value_for_probe(&probe(0), 1.0), Err(StoreError::ReplicateSetValue(_))));
    }

    #[test]
    fn test_mean_requires_every_member() {
        let a = quantitated("a", &[2.0, 1.0]);
        let b = FixedStore::new("b", StoreKind::DataSet).shared();
        b.probe_set_replaced(2);
        let set = ReplicateSet::new("r", vec![a, Arc::clone(&b)]).unwrap();

        assert!(!set.has_value_for_probe(&probe(0)));
        assert!(matches!(set.value_for_probe(&probe(0)), Err(StoreError::NoQuantitation(_))));
        assert!(!set.is_quantitated());

        b.set_value_for_probe(&probe(0), 4.0).unwrap();
        assert_eq!(set.value_for_probe(&probe(0)).unwrap(), 3.0);
        assert!(set.is_quantitated());
    }

    #[test]
    fn test_excluding_unmeasured_ignores_nan() {
        let set = ReplicateSet::new(
            "r",
            vec![quantitated("a", &[f32::NAN, f32::NAN]), quantitated("b", &[6.0, f32::NAN])],
        )
        .unwrap();
        assert!(set.value_for_probe(&probe(0)).unwrap().is_nan());
        assert_eq!(set.value_for_probe_excluding_unmeasured(&probe(0)).unwrap(), 6.0);
        assert!(set.value_for_probe_excluding_unmeasured(&probe(1)).unwrap().is_nan());
    }

    #[test]
    fn test_dispersion() {
        let set = ReplicateSet::new(
            "r",
            vec![quantitated("a", &[2.0]), quantitated("b", &[4.0]), quantitated("c", &[6.0])],
        )
        .unwrap();
        let p = probe(0);

        assert_eq!(set.values_for_probe(&p).unwrap(), vec![2.0, 4.0, 6.0]);
        assert!((set.stdev_for_probe(&p).unwrap() - 2.0).abs() < 1e-6);
        assert!((set.sem_for_probe(&p).unwrap() - 2.0 / 3f32.sqrt()).abs() < 1e-6);
        assert!((set.coefficient_of_variation_for_probe(&p).unwrap() - 0.5).abs() < 1e-6);
        // nearest-rank quartiles are 2 and 4
        assert!((set.quartile_coefficient_of_dispersion_for_probe(&p).unwrap() - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_unmeasured_count() {
        // each member's null value is the minimum it has seen
        let set = ReplicateSet::new(
            "r",
            vec![quantitated("a", &[0.0, 5.0]), quantitated("b", &[3.0, 1.0]), quantitated("c", &[f32::NAN, 2.0])],
        )
        .unwrap();
        assert_eq!(set.unmeasured_count_for_probe(&probe(0)).unwrap(), 2);
        assert_eq!(set.unmeasured_count_for_probe(&probe(1)).unwrap(), 1);
    }

    #[test]
    fn test_correction_is_zero() {
        let set = ReplicateSet::new("r", Vec::new()).unwrap();
        assert_eq!(set.correction_for_length(&Chromosome::new("1", 10), 0, 100).unwrap(), 0.0);
        assert!(!set.is_valid_hic());
        assert!(set.as_hic().is_none());
    }
}
