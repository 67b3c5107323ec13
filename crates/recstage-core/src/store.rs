//! Storage contract consumed by the pipeline

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::filter::{RecordFilter, RecordPatch};
use crate::record::StoredRecord;

/// Keyed record table.
///
/// The pipeline performs no locking of its own; backends must make each
/// method individually atomic.
pub trait RecordStore: Send + Sync {
    fn get_by_id(&self, id: &str) -> Result<Option<StoredRecord>>;

    fn upsert(&self, record: &StoredRecord) -> Result<()>;

    /// Single conditional batch update; returns the number of matched records.
    fn update_many(&self, filter: &RecordFilter, patch: &RecordPatch) -> Result<usize>;

    /// Snapshot of all records matching `filter`, ordered by id.
    fn find(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>>;

    fn count(&self, filter: &RecordFilter) -> Result<usize>;

    /// Strictly increasing timestamp source.
    fn now(&self) -> DateTime<Utc>;
}

/// Strictly monotonic clock built on the wall clock.
///
/// Two consecutive readings always differ by at least one microsecond, which
/// keeps `updated < start` comparisons meaningful within a fast batch.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: std::sync::atomic::AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        use std::sync::atomic::Ordering;

        let wall = Utc::now().timestamp_micros();
        let mut prev = self.last_micros.load(Ordering::Relaxed);
        loop {
            let next = wall.max(prev + 1);
            match self.last_micros.compare_exchange_weak(
                prev,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_default(),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Never hand out a timestamp at or below `t` (e.g. after reopening a database).
    pub fn advance_past(&self, t: DateTime<Utc>) {
        self.last_micros
            .fetch_max(t.timestamp_micros(), std::sync::atomic::Ordering::Relaxed);
    }
}
