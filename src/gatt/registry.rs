use std::collections::HashMap;

use uuid::Uuid;

use super::operation::{Operation, OperationId};

/// Operations awaiting a hardware event, keyed by characteristic UUID.
///
/// Entries are keyed by the operation's own characteristic, so every
/// operation listed under a UUID targets that UUID.
#[derive(Debug, Default)]
pub struct PendingRegistry {
    by_characteristic: HashMap<Uuid, Vec<Operation>>,
}

impl PendingRegistry {
    pub(crate) fn register(&mut self, operation: Operation) {
        self.by_characteristic
            .entry(operation.target().characteristic())
            .or_default()
            .push(operation);
    }

    /// Returns a copy of the operations registered for a characteristic.
    ///
    /// Callers iterate the copy, so handling one entry may mutate the live list.
    #[must_use]
    pub fn operations_for(&self, characteristic: &Uuid) -> Vec<Operation> {
        self.by_characteristic
            .get(characteristic)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn remove(&mut self, characteristic: &Uuid, id: OperationId) -> Option<Operation> {
        let operations = self.by_characteristic.get_mut(characteristic)?;
        let position = operations.iter().position(|operation| operation.id() == id)?;
        let removed = operations.remove(position);
        if operations.is_empty() {
            self.by_characteristic.remove(characteristic);
        }
        Some(removed)
    }

    pub(crate) fn remove_where<F>(&mut self, characteristic: &Uuid, predicate: F) -> Vec<Operation>
    where
        F: Fn(&Operation) -> bool,
    {
        let Some(operations) = self.by_characteristic.get_mut(characteristic) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<_>, Vec<_>) = operations.drain(..).partition(|op| predicate(op));
        if kept.is_empty() {
            self.by_characteristic.remove(characteristic);
        } else {
            *operations = kept;
        }
        removed
    }

    /// Drops every entry and returns the ids that were abandoned.
    pub(crate) fn clear(&mut self) -> Vec<OperationId> {
        self.by_characteristic
            .drain()
            .flat_map(|(_characteristic, operations)| operations)
            .map(|operation| operation.id())
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: OperationId) -> bool {
        self.by_characteristic
            .values()
            .flatten()
            .any(|operation| operation.id() == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_characteristic.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_characteristic.is_empty()
    }
}
