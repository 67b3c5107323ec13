//! In-process record table

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use recstage_core::{
    IngestError, MonotonicClock, RecordFilter, RecordPatch, RecordStore, Result, StoredRecord,
};

/// Mutex-guarded map of records keyed by id.
///
/// Used by tests and short-lived imports; every method holds the lock for
/// its whole duration, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, StoredRecord>>,
    clock: MonotonicClock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredRecord>>> {
        self.records
            .lock()
            .map_err(|_| IngestError::Store("memory store lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordStore for MemoryStore {
    fn get_by_id(&self, id: &str) -> Result<Option<StoredRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn upsert(&self, record: &StoredRecord) -> Result<()> {
        self.lock()?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn update_many(&self, filter: &RecordFilter, patch: &RecordPatch) -> Result<usize> {
        if filter.is_empty_match() {
            return Ok(0);
        }
        let mut records = self.lock()?;
        let mut n = 0;
        for record in records.values_mut().filter(|r| filter.matches(r)) {
            patch.apply(record);
            n += 1;
        }
        Ok(n)
    }

    fn find(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        if filter.is_empty_match() {
            return Ok(Vec::new());
        }
        Ok(self
            .lock()?
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn count(&self, filter: &RecordFilter) -> Result<usize> {
        if filter.is_empty_match() {
            return Ok(0);
        }
        Ok(self.lock()?.values().filter(|r| filter.matches(r)).count())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
