//! Dedup handler that only maintains candidate keys
//!
//! Matching is done elsewhere: this handler refreshes the fingerprints the
//! matcher reads and reports whether a record should be (re)queued.

use std::sync::atomic::{AtomicUsize, Ordering};

use recstage_core::{DedupHandler, DedupKeys, MetadataRecord, Result, StoredRecord, unique_ids};

#[derive(Debug, Default)]
pub struct QueueingDedupHandler {
    queued: AtomicUsize,
    removed: AtomicUsize,
}

impl QueueingDedupHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records reported as needing dedup processing so far.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Group removals requested so far.
    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::Relaxed)
    }
}

impl DedupHandler for QueueingDedupHandler {
    fn update_dedup_candidate_keys(
        &self,
        record: &mut StoredRecord,
        metadata: &dyn MetadataRecord,
    ) -> Result<bool> {
        let keys = candidate_keys(metadata);
        let changed = keys != record.dedup_keys;
        record.dedup_keys = keys;

        // still pending from an earlier harvest
        let needed = changed || record.update_needed;
        if needed {
            self.queued.fetch_add(1, Ordering::Relaxed);
        }
        Ok(needed)
    }

    fn remove_from_dedup_record(&self, dedup_id: &str, record_id: &str) -> Result<()> {
        log::info!("removing {record_id} from dedup group {dedup_id}");
        self.removed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Title, ISBN and identifier keys for one parsed record.
pub fn candidate_keys(metadata: &dyn MetadataRecord) -> DedupKeys {
    DedupKeys {
        title_keys: metadata.title().and_then(|t| title_key(&t)).into_iter().collect(),
        isbn_keys: unique_ids(metadata.isbns().iter().filter_map(|i| isbn13(i))),
        id_keys: metadata.linking_ids(),
    }
}

/// Lowercased alphanumeric words separated by single spaces.
fn title_key(title: &str) -> Option<String> {
    let cleaned: String = title
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .flat_map(char::to_lowercase)
        .collect();
    let key = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!key.is_empty()).then_some(key)
}

/// ISBN-13 form of a 10 or 13 digit ISBN; anything else is dropped.
fn isbn13(isbn: &str) -> Option<String> {
    let chars: Vec<char> = isbn
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect();
    match chars.len() {
        13 if chars.iter().all(char::is_ascii_digit) => Some(chars.into_iter().collect()),
        10 if chars[..9].iter().all(char::is_ascii_digit) => {
            let body = format!("978{}", chars[..9].iter().collect::<String>());
            let sum: u32 = body
                .chars()
                .filter_map(|c| c.to_digit(10))
                .enumerate()
                .map(|(i, d)| if i % 2 == 0 { d } else { d * 3 })
                .sum();
            let check = (10 - sum % 10) % 10;
            Some(format!("{body}{check}"))
        }
        _ => None,
    }
}
