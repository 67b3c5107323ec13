//! Record predicates and batch patches shared by all store backends

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;

use crate::record::StoredRecord;

/// Conjunctive predicate over stored records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    /// `source_id` is one of these.
    pub source_ids: Option<Vec<String>>,
    /// At least one `linking_id` is one of these.
    pub linking_ids: Option<Vec<String>>,
    pub main_id: Option<String>,
    pub oai_id: Option<String>,
    pub deleted: Option<bool>,
    pub mark: Option<bool>,
    /// `updated` strictly earlier than this.
    pub updated_before: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(self, source_id: impl Into<String>) -> Self {
        self.sources(vec![source_id.into()])
    }

    pub fn sources(mut self, source_ids: Vec<String>) -> Self {
        self.source_ids = Some(source_ids);
        self
    }

    pub fn linking(mut self, linking_ids: Vec<String>) -> Self {
        self.linking_ids = Some(linking_ids);
        self
    }

    pub fn main_id(mut self, main_id: impl Into<String>) -> Self {
        self.main_id = Some(main_id.into());
        self
    }

    pub fn oai_id(mut self, oai_id: impl Into<String>) -> Self {
        self.oai_id = Some(oai_id.into());
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub fn mark(mut self, mark: bool) -> Self {
        self.mark = Some(mark);
        self
    }

    pub fn updated_before(mut self, t: DateTime<Utc>) -> Self {
        self.updated_before = Some(t);
        self
    }

    /// Filter selecting the host records referenced by `host_ids` within `host_sources`.
    pub fn hosts(host_sources: Vec<String>, host_ids: Vec<String>) -> Self {
        Self::new().sources(host_sources).linking(host_ids)
    }

    /// Whether an empty `IN` set makes this filter match nothing.
    pub fn is_empty_match(&self) -> bool {
        self.source_ids.as_ref().is_some_and(Vec::is_empty)
            || self.linking_ids.as_ref().is_some_and(Vec::is_empty)
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        if let Some(sources) = &self.source_ids {
            if !sources.iter().any(|s| *s == record.source_id) {
                return false;
            }
        }
        if let Some(linking) = &self.linking_ids {
            let wanted: FxHashSet<&str> = linking.iter().map(String::as_str).collect();
            if !record.linking_id.iter().any(|l| wanted.contains(l.as_str())) {
                return false;
            }
        }
        if let Some(main_id) = &self.main_id {
            if record.main_id.as_deref() != Some(main_id.as_str()) {
                return false;
            }
        }
        if let Some(oai_id) = &self.oai_id {
            if record.oai_id != *oai_id {
                return false;
            }
        }
        if self.deleted.is_some_and(|d| d != record.deleted) {
            return false;
        }
        if self.mark.is_some_and(|m| m != record.mark) {
            return false;
        }
        if self.updated_before.is_some_and(|t| record.updated >= t) {
            return false;
        }
        true
    }
}

/// Field updates applied by a conditional batch update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub deleted: Option<bool>,
    pub update_needed: Option<bool>,
    pub updated: Option<DateTime<Utc>>,
    pub mark: Option<bool>,
}

impl RecordPatch {
    /// Retire a record: deleted, not pending dedup, touched at `now`.
    pub fn retire(now: DateTime<Utc>) -> Self {
        Self {
            deleted: Some(true),
            update_needed: Some(false),
            updated: Some(now),
            mark: None,
        }
    }

    /// Flag for asynchronous dedup reprocessing.
    pub fn flag_update_needed() -> Self {
        Self {
            update_needed: Some(true),
            ..Default::default()
        }
    }

    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            updated: Some(now),
            ..Default::default()
        }
    }

    pub fn clear_mark() -> Self {
        Self {
            mark: Some(false),
            ..Default::default()
        }
    }

    /// Apply in place. A deleted record never ends up pending dedup.
    pub fn apply(&self, record: &mut StoredRecord) {
        if let Some(deleted) = self.deleted {
            record.deleted = deleted;
        }
        if let Some(update_needed) = self.update_needed {
            record.update_needed = update_needed;
        }
        if let Some(updated) = self.updated {
            record.updated = updated;
        }
        if let Some(mark) = self.mark {
            record.mark = mark;
        }
        if record.deleted {
            record.update_needed = false;
        }
    }
}
