//! Hooks into the external deduplication subsystem

use crate::error::Result;
use crate::record::{MetadataRecord, StoredRecord};

/// The two mutations the staging pipeline needs from the dedup subsystem.
///
/// How duplicates are judged is entirely up to the implementation.
pub trait DedupHandler: Send + Sync {
    /// Refresh candidate keys on `record`; returns whether it needs (re)processing.
    fn update_dedup_candidate_keys(
        &self,
        record: &mut StoredRecord,
        metadata: &dyn MetadataRecord,
    ) -> Result<bool>;

    /// Drop `record_id` from the dedup group `dedup_id`.
    fn remove_from_dedup_record(&self, dedup_id: &str, record_id: &str) -> Result<()>;
}
