//! In-process lock store.
//!
//! Every operation runs under one mutex, which makes each call atomic for all
//! threads sharing the store. Used in tests and for local dry runs.

use super::store::{
    DeleteOutcome, DeletePrecondition, LockStore, WriteOutcome, WritePrecondition,
    evaluate_delete, evaluate_write,
};
use super::types::{LockRecord, ResourceKey};
use crate::error::{GateError, Result};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<ResourceKey, LockRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record without any precondition (test setup).
    #[cfg(test)]
    pub(crate) fn insert(&self, key: ResourceKey, record: LockRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.insert(key, record);
        }
    }

    fn records(&self) -> Result<MutexGuard<'_, BTreeMap<ResourceKey, LockRecord>>> {
        self.records
            .lock()
            .map_err(|_| GateError::StoreUnavailable("memory store mutex poisoned".to_string()))
    }
}

impl LockStore for MemoryStore {
    fn read(&self, key: &ResourceKey) -> Result<Option<LockRecord>> {
        Ok(self.records()?.get(key).cloned())
    }

    fn conditional_write(
        &self,
        key: &ResourceKey,
        precondition: WritePrecondition,
        record: LockRecord,
    ) -> Result<WriteOutcome> {
        let mut records = self.records()?;
        let outcome = evaluate_write(records.get(key).cloned(), precondition);
        if matches!(outcome, WriteOutcome::Applied { .. }) {
            records.insert(key.clone(), record);
        }
        Ok(outcome)
    }

    fn delete(&self, key: &ResourceKey, precondition: DeletePrecondition) -> Result<DeleteOutcome> {
        let mut records = self.records()?;
        let outcome = evaluate_delete(records.get(key).cloned(), precondition);
        if matches!(outcome, DeleteOutcome::Deleted(_)) {
            records.remove(key);
        }
        Ok(outcome)
    }

    fn list(&self) -> Result<Vec<(ResourceKey, LockRecord)>> {
        Ok(self
            .records()?
            .iter()
            .map(|(key, record)| (key.clone(), record.clone()))
            .collect())
    }
}
