//! Change notifications fanned out by the registry

use crate::store::StoreId;
use log::trace;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum DataChange {
    DataSetAdded(StoreId),
    DataSetsRemoved(Vec<StoreId>),
    GroupAdded(StoreId),
    GroupsRemoved(Vec<StoreId>),
    ReplicateSetAdded(StoreId),
    ReplicateSetsRemoved(Vec<StoreId>),
    StoreRenamed(StoreId),
    GroupMembersChanged(StoreId),
    ReplicateSetMembersChanged(StoreId),
    ActiveStoreChanged(Option<StoreId>),
    ProbeSetReplaced { probe_count: usize },
    ActiveProbeListChanged(Option<String>),
}

pub trait DataChangeListener: Send + Sync {
    fn data_changed(&self, change: &DataChange);
}

#[derive(Default)]
pub struct ListenerHub {
    listeners: RwLock<Vec<Arc<dyn DataChangeListener>>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<dyn DataChangeListener>) {
        self.listeners.write().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn DataChangeListener>) {
        self.listeners
            .write()
            .retain(|l| !std::ptr::addr_eq(Arc::as_ptr(l), Arc::as_ptr(listener)));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Listeners are called outside the lock so they may add or remove listeners
    pub fn notify(&self, change: &DataChange) {
        let listeners: Vec<Arc<dyn DataChangeListener>> = self.listeners.read().clone();
        trace!("Notifying {} listeners of {:?}", listeners.len(), change);
        for listener in listeners {
            listener.data_changed(change);
        }
    }
}

impl std::fmt::Debug for ListenerHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHub").field("listeners", &self.listener_count()).finish()
    }
}

/// Listener that records every change, handy for tests and tooling
#[derive(Debug, Default)]
pub struct RecordingListener {
    changes: parking_lot::Mutex<Vec<DataChange>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<DataChange> {
        self.changes.lock().clone()
    }

    pub fn clear(&self) {
        self.changes.lock().clear();
    }
}

impl DataChangeListener for RecordingListener {
    fn data_changed(&self, change: &DataChange) {
        self.changes.lock().push(change.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_and_remove() {
        let hub = ListenerHub::new();
        let recorder = Arc::new(RecordingListener::new());
        let listener: Arc<dyn DataChangeListener> = recorder.clone();

        hub.add_listener(Arc::clone(&listener));
        hub.notify(&DataChange::StoreRenamed(StoreId::from_raw(1)));
        assert_eq!(recorder.changes(), vec![DataChange::StoreRenamed(StoreId::from_raw(1))]);

        hub.remove_listener(&listener);
        assert_eq!(hub.listener_count(), 0);
        hub.notify(&DataChange::ActiveStoreChanged(None));
        assert_eq!(recorder.changes().len(), 1);
    }
}
