//! Per-probe quantitation values

use crate::error::{StoreError, StoreResult};
use parking_lot::RwLock;

#[derive(Debug)]
struct TableState {
    probe_count: usize,
    values: Option<Vec<f32>>,
    null_value: f32,
}

impl TableState {
    fn empty(probe_count: usize) -> Self {
        Self { probe_count, values: None, null_value: f32::INFINITY }
    }
}

/// Dense `f32` array indexed by probe index, allocated on first write.
///
/// The null sentinel is NaN once any NaN has been stored, otherwise the
/// smallest value stored so far.
#[derive(Debug)]
pub struct QuantitationTable {
    state: RwLock<TableState>,
}

impl Default for QuantitationTable {
    fn default() -> Self {
        Self::new(0)
    }
}

impl QuantitationTable {
    pub fn new(probe_count: usize) -> Self {
        Self { state: RwLock::new(TableState::empty(probe_count)) }
    }

    /// Drops all values and resizes for a new probe set
    pub fn probe_set_replaced(&self, probe_count: usize) {
        *self.state.write() = TableState::empty(probe_count);
    }

    /// Drops all values, keeping the current size
    pub fn reset(&self) {
        let mut state = self.state.write();
        let probe_count = state.probe_count;
        *state = TableState::empty(probe_count);
    }

    pub fn probe_count(&self) -> usize {
        self.state.read().probe_count
    }

    pub fn set_value(&self, index: usize, value: f32) -> StoreResult<()> {
        let mut state = self.state.write();
        if index >= state.probe_count {
            return Err(StoreError::ProbeIndexOutOfRange { index, len: state.probe_count });
        }

        let probe_count = state.probe_count;
        let values = state.values.get_or_insert_with(|| vec![f32::NAN; probe_count]);
        values[index] = value;

        if !state.null_value.is_nan() {
            if value.is_nan() {
                state.null_value = f32::NAN;
            } else if value < state.null_value {
                state.null_value = value;
            }
        }
        Ok(())
    }

    /// `store` names the owner in the error when nothing has been set
    pub fn value(&self, index: usize, store: &str) -> StoreResult<f32> {
        let state = self.state.read();
        let values = state
            .values
            .as_ref()
            .ok_or_else(|| StoreError::NoQuantitation(store.to_string()))?;

        values
            .get(index)
            .copied()
            .ok_or(StoreError::ProbeIndexOutOfRange { index, len: values.len() })
    }

    pub fn has_value(&self, index: usize) -> bool {
        let state = self.state.read();
        state.values.as_ref().is_some_and(|v| index < v.len())
    }

    pub fn is_quantitated(&self) -> bool {
        self.state.read().values.is_some()
    }

    pub fn null_value(&self) -> f32 {
        self.state.read().null_value
    }
}
