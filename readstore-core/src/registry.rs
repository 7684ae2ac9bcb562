//! Registry of every store in a session
//!
//! The registry is the only place stores are added or removed. It owns the
//! listener hub; stores keep a weak handle to it so renames and membership
//! changes reach the same listeners.

use crate::context::StoreContext;
use crate::error::{StoreError, StoreResult};
use crate::events::{DataChange, DataChangeListener, ListenerHub};
use crate::group::DataGroup;
use crate::replicate::ReplicateSet;
use crate::store::{DataStore, SharedStore, StoreId};
use crate::types::{Genome, ProbeSet};
use log::{debug, info};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct RegistryState {
    probe_set: Option<Arc<ProbeSet>>,
    active_probe_list: Option<String>,
    data_sets: Vec<SharedStore>,
    groups: Vec<Arc<DataGroup>>,
    replicate_sets: Vec<Arc<ReplicateSet>>,
    active: Option<StoreId>,
}

impl RegistryState {
    fn probe_count(&self) -> usize {
        self.probe_set.as_ref().map_or(0, |p| p.len())
    }

    fn contains(&self, id: StoreId) -> bool {
        self.data_sets.iter().any(|s| s.id() == id)
            || self.groups.iter().any(|g| g.id() == id)
            || self.replicate_sets.iter().any(|r| r.id() == id)
    }

    fn all_stores(&self) -> Vec<SharedStore> {
        let mut replicate_sets: Vec<SharedStore> =
            self.replicate_sets.iter().map(|r| Arc::clone(r) as SharedStore).collect();
        let mut groups: Vec<SharedStore> = self.groups.iter().map(|g| Arc::clone(g) as SharedStore).collect();
        let mut data_sets = self.data_sets.clone();
        for list in [&mut replicate_sets, &mut groups, &mut data_sets] {
            sort_by_name(list);
        }

        replicate_sets.extend(groups);
        replicate_sets.extend(data_sets);
        replicate_sets
    }
}

fn sort_by_name(stores: &mut [SharedStore]) {
    stores.sort_by_cached_key(|s| s.name().to_lowercase());
}

#[derive(Debug)]
pub struct Registry {
    context: Arc<StoreContext>,
    genome: Arc<Genome>,
    hub: Arc<ListenerHub>,
    state: RwLock<RegistryState>,
}

impl Registry {
    pub fn new(context: Arc<StoreContext>, genome: Arc<Genome>) -> Self {
        Self { context, genome, hub: Arc::new(ListenerHub::new()), state: RwLock::new(RegistryState::default()) }
    }

    pub fn context(&self) -> &Arc<StoreContext> {
        &self.context
    }

    pub fn genome(&self) -> &Arc<Genome> {
        &self.genome
    }

    pub fn add_listener(&self, listener: Arc<dyn DataChangeListener>) {
        self.hub.add_listener(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DataChangeListener>) {
        self.hub.remove_listener(listener);
    }

    /// Registers a data set or paired data set. Returns false if it was
    /// already registered.
    pub fn add_data_set(&self, store: SharedStore) -> StoreResult<bool> {
        if !store.kind().is_sample() {
            return Err(StoreError::InvalidMember {
                store: store.name(),
                reason: "only data sets can be registered as data sets",
            });
        }

        let probe_count = {
            let mut state = self.state.write();
            if state.data_sets.iter().any(|s| s.id() == store.id()) {
                return Ok(false);
            }
            state.data_sets.push(Arc::clone(&store));
            state.probe_count()
        };

        store.core().attach(&self.hub);
        store.probe_set_replaced(probe_count);
        debug!("Registered data set {} ({})", store.name(), store.id());
        self.hub.notify(&DataChange::DataSetAdded(store.id()));
        Ok(true)
    }

    pub fn add_group(&self, group: Arc<DataGroup>) -> bool {
        let probe_count = {
            let mut state = self.state.write();
            if state.groups.iter().any(|g| Arc::ptr_eq(g, &group)) {
                return false;
            }
            state.groups.push(Arc::clone(&group));
            state.probe_count()
        };

        group.core().attach(&self.hub);
        group.probe_set_replaced(probe_count);
        self.hub.notify(&DataChange::GroupAdded(group.id()));
        true
    }

    pub fn add_replicate_set(&self, set: Arc<ReplicateSet>) -> bool {
        {
            let mut state = self.state.write();
            if state.replicate_sets.iter().any(|r| Arc::ptr_eq(r, &set)) {
                return false;
            }
            state.replicate_sets.push(Arc::clone(&set));
        }

        set.core().attach(&self.hub);
        self.hub.notify(&DataChange::ReplicateSetAdded(set.id()));
        true
    }

    /// Removes data sets from every group and replicate set, then from the
    /// registry. Their temp files are deleted.
    pub fn remove_data_sets(&self, ids: &[StoreId]) {
        let (targets, groups, replicate_sets) = {
            let state = self.state.read();
            let targets: Vec<SharedStore> =
                state.data_sets.iter().filter(|s| ids.contains(&s.id())).cloned().collect();
            (targets, state.groups.clone(), state.replicate_sets.clone())
        };
        if targets.is_empty() {
            return;
        }

        for target in &targets {
            for group in &groups {
                group.remove_member(target);
            }
            for set in &replicate_sets {
                set.remove_member(target);
            }
        }

        let removed: Vec<StoreId> = targets.iter().map(|s| s.id()).collect();
        self.hub.notify(&DataChange::DataSetsRemoved(removed.clone()));
        self.forget(&removed, |state| state.data_sets.retain(|s| !removed.contains(&s.id())));

        for target in targets {
            target.core().detach();
            target.dispose();
        }
        info!("Removed {} data sets", removed.len());
    }

    /// Removes groups from every replicate set, then from the registry
    pub fn remove_groups(&self, ids: &[StoreId]) {
        let (targets, replicate_sets) = {
            let state = self.state.read();
            let targets: Vec<Arc<DataGroup>> =
                state.groups.iter().filter(|g| ids.contains(&g.id())).cloned().collect();
            (targets, state.replicate_sets.clone())
        };
        if targets.is_empty() {
            return;
        }

        for target in &targets {
            let shared: SharedStore = Arc::clone(target) as SharedStore;
            for set in &replicate_sets {
                set.remove_member(&shared);
            }
        }

        let removed: Vec<StoreId> = targets.iter().map(|g| g.id()).collect();
        self.hub.notify(&DataChange::GroupsRemoved(removed.clone()));
        self.forget(&removed, |state| state.groups.retain(|g| !removed.contains(&g.id())));

        for target in targets {
            target.core().detach();
            target.dispose();
        }
    }

    pub fn remove_replicate_sets(&self, ids: &[StoreId]) {
        let targets: Vec<Arc<ReplicateSet>> = {
            let state = self.state.read();
            state.replicate_sets.iter().filter(|r| ids.contains(&r.id())).cloned().collect()
        };
        if targets.is_empty() {
            return;
        }

        let removed: Vec<StoreId> = targets.iter().map(|r| r.id()).collect();
        self.hub.notify(&DataChange::ReplicateSetsRemoved(removed.clone()));
        self.forget(&removed, |state| state.replicate_sets.retain(|r| !removed.contains(&r.id())));

        for target in targets {
            target.core().detach();
        }
    }

    /// Applies a removal and drops the active store if it went with it
    fn forget<F>(&self, removed: &[StoreId], apply: F)
    where
        F: FnOnce(&mut RegistryState),
    {
        let active_cleared = {
            let mut state = self.state.write();
            apply(&mut state);
            match state.active {
                Some(active) if removed.contains(&active) => {
                    state.active = None;
                    true
                }
                _ => false,
            }
        };
        if active_cleared {
            self.hub.notify(&DataChange::ActiveStoreChanged(None));
        }
    }

    /// Replaces the probe set and resets every store's quantitation
    pub fn set_probe_set(&self, probe_set: ProbeSet) {
        let probe_count = probe_set.len();
        let stores = {
            let mut state = self.state.write();
            state.probe_set = Some(Arc::new(probe_set));
            state.all_stores()
        };

        for store in &stores {
            store.probe_set_replaced(probe_count);
        }
        info!("Probe set replaced: {} probes, {} stores reset", probe_count, stores.len());
        self.hub.notify(&DataChange::ProbeSetReplaced { probe_count });
    }

    pub fn probe_set(&self) -> Option<Arc<ProbeSet>> {
        self.state.read().probe_set.clone()
    }

    pub fn set_active_probe_list(&self, list: Option<String>) {
        self.state.write().active_probe_list = list.clone();
        self.hub.notify(&DataChange::ActiveProbeListChanged(list));
    }

    pub fn active_probe_list(&self) -> Option<String> {
        self.state.read().active_probe_list.clone()
    }

    /// `None` clears the active store
    pub fn set_active_store(&self, id: Option<StoreId>) -> StoreResult<()> {
        {
            let mut state = self.state.write();
            if let Some(id) = id {
                if !state.contains(id) {
                    return Err(StoreError::UnknownStore(id));
                }
            }
            state.active = id;
        }
        self.hub.notify(&DataChange::ActiveStoreChanged(id));
        Ok(())
    }

    /// The explicitly active store, or the only store if there is exactly one
    pub fn active_store(&self) -> Option<SharedStore> {
        let state = self.state.read();
        let stores = state.all_stores();
        match state.active {
            Some(active) => stores.into_iter().find(|s| s.id() == active),
            None if stores.len() == 1 => stores.into_iter().next(),
            None => None,
        }
    }

    pub fn store(&self, id: StoreId) -> Option<SharedStore> {
        self.state.read().all_stores().into_iter().find(|s| s.id() == id)
    }

    /// Replicate sets, then groups, then data sets, each sorted by name
    /// ignoring case
    pub fn all_stores(&self) -> Vec<SharedStore> {
        self.state.read().all_stores()
    }

    pub fn data_sets(&self) -> Vec<SharedStore> {
        let mut stores = self.state.read().data_sets.clone();
        sort_by_name(&mut stores);
        stores
    }

    pub fn groups(&self) -> Vec<Arc<DataGroup>> {
        let mut groups = self.state.read().groups.clone();
        groups.sort_by_cached_key(|g| g.name().to_lowercase());
        groups
    }

    pub fn replicate_sets(&self) -> Vec<Arc<ReplicateSet>> {
        let mut sets = self.state.read().replicate_sets.clone();
        sets.sort_by_cached_key(|r| r.name().to_lowercase());
        sets
    }

    /// True when a non-empty probe set exists and any store has values
    pub fn is_quantitated(&self) -> bool {
        let state = self.state.read();
        state.probe_count() > 0 && state.all_stores().iter().any(|s| s.is_quantitated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::testing::FixedStore;
    use crate::events::RecordingListener;
    use crate::read::PackedRead;
    use crate::store::StoreKind;
    use crate::types::{Probe, Strand};

    fn registry() -> (Registry, Arc<RecordingListener>) {
        let mut genome = Genome::new();
        genome.add_chromosome("1", 10_000);
        let registry = Registry::new(StoreContext::shared(Default::default()), Arc::new(genome));
        let recorder = Arc::new(RecordingListener::new());
        registry.add_listener(recorder.clone());
        (registry, recorder)
    }

    fn sample(name: &str) -> SharedStore {
        FixedStore::new(name, StoreKind::DataSet).shared()
    }

    fn probe_set(registry: &Registry, count: u32) -> ProbeSet {
        let chr = registry.genome().chromosomes()[0].clone();
        ProbeSet::new("probes", (0..count).map(|i| (Arc::clone(&chr), PackedRead::new(i * 10, i * 10 + 5, Strand::Unknown))))
    }

    #[test]
    fn test_add_is_deduplicated_and_notifies() {
        let (registry, recorder) = registry();
        let a = sample("a");
        assert!(registry.add_data_set(Arc::clone(&a)).unwrap());
        assert!(!registry.add_data_set(Arc::clone(&a)).unwrap());
        assert_eq!(registry.data_sets().len(), 1);
        assert_eq!(recorder.changes(), vec![DataChange::DataSetAdded(a.id())]);

        let group = FixedStore::new("g", StoreKind::Group).shared();
        assert!(registry.add_data_set(group).is_err());
    }

    #[test]
    fn test_all_stores_ordering() {
        let (registry, _) = registry();
        let b = sample("beta");
        let a = sample("Alpha");
        registry.add_data_set(Arc::clone(&b)).unwrap();
        registry.add_data_set(Arc::clone(&a)).unwrap();
        let group = Arc::new(DataGroup::new("zeta group", vec![Arc::clone(&a)]).unwrap());
        registry.add_group(Arc::clone(&group));
        let reps = Arc::new(ReplicateSet::new("reps", vec![Arc::clone(&b)]).unwrap());
        registry.add_replicate_set(Arc::clone(&reps));

        let names: Vec<String> = registry.all_stores().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["reps", "zeta group", "Alpha", "beta"]);
    }

    #[test]
    fn test_remove_data_set_cascades() {
        let (registry, recorder) = registry();
        let a = sample("a");
        let b = sample("b");
        registry.add_data_set(Arc::clone(&a)).unwrap();
        registry.add_data_set(Arc::clone(&b)).unwrap();
        let group = Arc::new(DataGroup::new("g", vec![Arc::clone(&a), Arc::clone(&b)]).unwrap());
        registry.add_group(Arc::clone(&group));
        let reps = Arc::new(ReplicateSet::new("r", vec![Arc::clone(&a), Arc::clone(&group) as SharedStore]).unwrap());
        registry.add_replicate_set(Arc::clone(&reps));
        recorder.clear();

        registry.remove_data_sets(&[a.id()]);
        assert!(!group.contains(&a));
        assert!(!reps.contains(&a));
        assert_eq!(registry.data_sets().len(), 1);
        assert_eq!(
            recorder.changes(),
            vec![
                DataChange::GroupMembersChanged(group.id()),
                DataChange::ReplicateSetMembersChanged(reps.id()),
                DataChange::DataSetsRemoved(vec![a.id()]),
            ]
        );

        // detached stores no longer reach the registry's listeners
        recorder.clear();
        a.set_name("renamed");
        assert!(recorder.changes().is_empty());

        registry.remove_groups(&[group.id()]);
        assert!(reps.is_empty());
        assert!(registry.groups().is_empty());
    }

    #[test]
    fn test_active_store() {
        let (registry, recorder) = registry();
        assert!(registry.active_store().is_none());

        let a = sample("a");
        registry.add_data_set(Arc::clone(&a)).unwrap();
        assert_eq!(registry.active_store().map(|s| s.id()), Some(a.id()));

        let b = sample("b");
        registry.add_data_set(Arc::clone(&b)).unwrap();
        assert!(registry.active_store().is_none());

        let stranger = sample("stranger");
        assert!(matches!(registry.set_active_store(Some(stranger.id())), Err(StoreError::UnknownStore(_))));

        registry.set_active_store(Some(b.id())).unwrap();
        assert_eq!(registry.active_store().map(|s| s.id()), Some(b.id()));
        assert_eq!(recorder.changes().last(), Some(&DataChange::ActiveStoreChanged(Some(b.id()))));

        registry.remove_data_sets(&[b.id()]);
        assert_eq!(recorder.changes().last(), Some(&DataChange::ActiveStoreChanged(None)));
        assert_eq!(registry.active_store().map(|s| s.id()), Some(a.id()));
    }

    #[test]
    fn test_probe_set_resets_quantitation() {
        let (registry, recorder) = registry();
        let a = sample("a");
        registry.add_data_set(Arc::clone(&a)).unwrap();
        assert!(!registry.is_quantitated());

        registry.set_probe_set(probe_set(&registry, 3));
        let probes = registry.probe_set().unwrap();
        let first: &Probe = &probes.probes()[0];
        a.set_value_for_probe(first, 1.5).unwrap();
        assert!(registry.is_quantitated());

        registry.set_probe_set(probe_set(&registry, 5));
        assert!(!a.is_quantitated());
        assert!(!registry.is_quantitated());
        assert_eq!(recorder.changes().last(), Some(&DataChange::ProbeSetReplaced { probe_count: 5 }));
    }

    #[test]
    fn test_active_probe_list() {
        let (registry, recorder) = registry();
        registry.set_active_probe_list(Some("hits".to_string()));
        assert_eq!(registry.active_probe_list().as_deref(), Some("hits"));
        assert_eq!(recorder.changes(), vec![DataChange::ActiveProbeListChanged(Some("hits".to_string()))]);
    }
}
