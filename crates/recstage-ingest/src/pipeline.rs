//! Staging pipeline: store, delete and hierarchy propagation
//!
//! One [`IngestionPipeline`] call processes one harvested unit to completion.
//! Chunks of a splitter batch are handled strictly in order: the batch main
//! id and the last stored id (for diagnostics) are carried from one chunk to
//! the next. Nothing spans records transactionally; every step is idempotent
//! per id, and the stale-children sweep keys off a timestamp taken before
//! the first chunk was written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recstage_core::{
    DataSourceSettings, DataSources, DedupHandler, IngestError, MetadataRecord, PreTransform,
    RecordFactory, RecordFilter, RecordPatch, RecordSplitter, RecordStore, Result, SplitterFactory,
    StoredRecord, TransformFactory,
};

/// Orchestrates parser, splitter, dedup handler and store.
///
/// Collaborators are borrowed; the pipeline owns no state between calls.
pub struct IngestionPipeline<'a> {
    store: &'a dyn RecordStore,
    records: &'a dyn RecordFactory,
    sources: &'a DataSources,
    splitters: Option<&'a dyn SplitterFactory>,
    transforms: Option<&'a dyn TransformFactory>,
    dedup: Option<&'a dyn DedupHandler>,
    mark_seen: bool,
}

/// Per-call settings resolved before the first chunk.
struct Batch<'s> {
    settings: &'s DataSourceSettings,
    oai_id: &'s str,
    deleted: bool,
    transform: Option<Arc<dyn PreTransform>>,
    dedup: &'s dyn DedupHandler,
    host_sources: Vec<String>,
}

/// Sequential state carried across the chunks of one batch.
#[derive(Default)]
struct BatchState {
    main_id: Option<String>,
    previous_id: Option<String>,
    written: usize,
}

/// Original and normalized serializations of one parsed chunk.
struct Parsed {
    metadata: Box<dyn MetadataRecord>,
    original: Vec<u8>,
    normalized: Vec<u8>,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        store: &'a dyn RecordStore,
        records: &'a dyn RecordFactory,
        sources: &'a DataSources,
    ) -> Self {
        Self {
            store,
            records,
            sources,
            splitters: None,
            transforms: None,
            dedup: None,
            mark_seen: false,
        }
    }

    pub fn with_splitters(mut self, splitters: &'a dyn SplitterFactory) -> Self {
        self.splitters = Some(splitters);
        self
    }

    pub fn with_transforms(mut self, transforms: &'a dyn TransformFactory) -> Self {
        self.transforms = Some(transforms);
        self
    }

    pub fn with_dedup_handler(mut self, dedup: &'a dyn DedupHandler) -> Self {
        self.dedup = Some(dedup);
        self
    }

    /// Set `mark` on every stored record (full-reharvest mode).
    pub fn mark_seen(mut self, mark_seen: bool) -> Self {
        self.mark_seen = mark_seen;
        self
    }

    fn dedup_handler(&self) -> Result<&'a dyn DedupHandler> {
        self.dedup
            .ok_or_else(|| IngestError::Config("no dedup handler bound".into()))
    }

    fn resolve_splitter(
        &self,
        settings: &DataSourceSettings,
    ) -> Result<Option<Arc<dyn RecordSplitter>>> {
        let Some(name) = &settings.record_splitter else {
            return Ok(None);
        };
        let factory = self.splitters.ok_or_else(|| {
            IngestError::Config(format!(
                "source '{}' uses splitter '{name}' but no splitter factory is bound",
                settings.source_id
            ))
        })?;
        factory.splitter(name).map(Some)
    }

    fn resolve_transform(
        &self,
        settings: &DataSourceSettings,
    ) -> Result<Option<Arc<dyn PreTransform>>> {
        let Some(name) = &settings.pre_transformation else {
            return Ok(None);
        };
        let factory = self.transforms.ok_or_else(|| {
            IngestError::Config(format!(
                "source '{}' uses pre-transformation '{name}' but no transform factory is bound",
                settings.source_id
            ))
        })?;
        factory.transform(name).map(Some)
    }

    /// Store one harvested unit; returns the number of records written.
    ///
    /// A deletion with an OAI id retires every fragment stored under that id.
    pub fn store_record(
        &self,
        source_id: &str,
        oai_id: &str,
        deleted: bool,
        payload: &[u8],
    ) -> Result<usize> {
        let dedup = self.dedup_handler()?;

        if deleted && !oai_id.is_empty() {
            return self.delete_by_oai_id(source_id, oai_id);
        }

        let settings = self.sources.get(source_id)?;
        let splitter = self.resolve_splitter(settings)?;
        let batch = Batch {
            settings,
            oai_id,
            deleted,
            transform: self.resolve_transform(settings)?,
            dedup,
            host_sources: settings.linked_host_sources(),
        };

        let start_time = self.store.now();
        let mut state = BatchState::default();

        match &splitter {
            Some(splitter) => {
                for chunk in splitter.split(payload)? {
                    self.store_chunk(&batch, &chunk?, &mut state)?;
                }
            }
            None => self.store_chunk(&batch, payload, &mut state)?,
        }

        if state.written > 1 && !settings.keep_missing_hierarchy_members {
            if let Some(main_id) = &state.main_id {
                self.retire_stale_children(source_id, main_id, start_time)?;
            }
        }

        Ok(state.written)
    }

    fn parse_chunk(&self, batch: &Batch<'_>, chunk: &[u8]) -> Result<Parsed> {
        let settings = batch.settings;
        let transformed;
        let data = match &batch.transform {
            Some(transform) => {
                transformed = transform.transform(chunk)?;
                transformed.as_slice()
            }
            None => chunk,
        };

        let mut metadata =
            self.records
                .create(&settings.format, data, batch.oai_id, &settings.source_id)?;
        let original = metadata.serialize()?;
        metadata.normalize();
        let normalized = metadata.serialize()?;

        Ok(Parsed {
            metadata,
            original,
            normalized,
        })
    }

    fn store_chunk(&self, batch: &Batch<'_>, chunk: &[u8], state: &mut BatchState) -> Result<()> {
        let settings = batch.settings;
        let Parsed {
            metadata,
            original,
            normalized,
        } = self.parse_chunk(batch, chunk)?;

        let mut local_id = metadata.id().trim().to_string();
        if local_id.is_empty() {
            local_id = batch.oai_id.trim().to_string();
        }
        if local_id.is_empty() {
            return Err(IngestError::Identification {
                source_id: settings.source_id.clone(),
                oai_id: batch.oai_id.to_string(),
                previous_id: state.previous_id.clone(),
            });
        }

        let mut deleted = batch.deleted;
        if !deleted && metadata.suppressed() {
            log::warn!(
                "{}: record '{local_id}' is suppressed, storing as deleted",
                settings.source_id
            );
            deleted = true;
        }

        let id = settings.record_id(&local_id);
        let now = self.store.now();
        let mut record = match self.store.get_by_id(&id)? {
            Some(mut existing) => {
                existing.updated = now;
                existing.date = now;
                existing
            }
            None => {
                StoredRecord::new(&id, &settings.source_id, batch.oai_id, &settings.format, now)
            }
        };
        record.oai_id = batch.oai_id.to_string();
        record.format = settings.format.clone();
        record.set_payload(original, normalized);
        record.deleted = deleted;
        record.host_record_ids = metadata.host_record_ids();
        record.linking_id = metadata.linking_ids();
        if self.mark_seen {
            record.mark = true;
        }

        match &state.main_id {
            None => {
                state.main_id = Some(id.clone());
                record.main_id = None;
            }
            Some(main_id) => record.main_id = Some(main_id.clone()),
        }

        let dropped_dedup_id = self.stage_dedup(batch, &mut record, metadata.as_ref(), now)?;

        self.store.upsert(&record)?;
        if let Some(dedup_id) = dropped_dedup_id {
            batch.dedup.remove_from_dedup_record(&dedup_id, &record.id)?;
        }

        log::debug!(
            "stored {} (source {}, deleted {})",
            record.id,
            record.source_id,
            record.deleted
        );
        state.previous_id = Some(id);
        state.written += 1;
        Ok(())
    }

    /// Decide `update_needed` and dedup enrollment for one chunk.
    ///
    /// Returns the dedup group the record must leave once it is saved.
    fn stage_dedup(
        &self,
        batch: &Batch<'_>,
        record: &mut StoredRecord,
        metadata: &dyn MetadataRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<String>> {
        if !batch.settings.dedup {
            record.dedup_keys.clear();
            record.update_needed = false;
            if record.is_component_part() {
                let touched = self.store.update_many(
                    &RecordFilter::hosts(
                        batch.host_sources.clone(),
                        record.host_record_ids.clone(),
                    ),
                    &RecordPatch::touch(now),
                )?;
                log::debug!("{}: touched {touched} host record(s)", record.id);
            }
            return Ok(record.dedup_id.take());
        }

        if record.deleted {
            record.update_needed = false;
            return Ok(record.dedup_id.take());
        }

        if !record.is_component_part() {
            record.update_needed = batch.dedup.update_dedup_candidate_keys(record, metadata)?;
            return Ok(None);
        }

        let flagged = self.store.update_many(
            &RecordFilter::hosts(batch.host_sources.clone(), record.host_record_ids.clone())
                .deleted(false),
            &RecordPatch::flag_update_needed(),
        )?;
        log::debug!("{}: flagged {flagged} host record(s) for dedup", record.id);
        record.update_needed = false;
        Ok(record.dedup_id.take())
    }

    /// Retire batch siblings stored by an earlier harvest that this one no
    /// longer produced.
    fn retire_stale_children(
        &self,
        source_id: &str,
        main_id: &str,
        start_time: DateTime<Utc>,
    ) -> Result<usize> {
        let filter = RecordFilter::new()
            .source(source_id)
            .main_id(main_id)
            .deleted(false)
            .updated_before(start_time);

        // enrolled siblings leave their dedup group one by one
        let mut retired = 0;
        for mut record in self.store.find(&filter)? {
            let Some(dedup_id) = record.dedup_id.take() else {
                continue;
            };
            RecordPatch::retire(self.store.now()).apply(&mut record);
            self.store.upsert(&record)?;
            self.dedup_handler()?
                .remove_from_dedup_record(&dedup_id, &record.id)?;
            retired += 1;
        }

        retired += self
            .store
            .update_many(&filter, &RecordPatch::retire(self.store.now()))?;
        if retired > 0 {
            log::info!("{source_id}: retired {retired} stale hierarchy member(s) of {main_id}");
        }
        Ok(retired)
    }

    /// Transition a stored record to deleted and notify its hosts.
    ///
    /// With `defer_host_update` hosts are flagged for dedup reprocessing;
    /// otherwise they are only touched.
    pub fn mark_record_deleted(
        &self,
        mut record: StoredRecord,
        defer_host_update: bool,
    ) -> Result<()> {
        let dedup_id = record.dedup_id.take();
        record.deleted = true;
        record.update_needed = false;
        record.updated = self.store.now();
        self.store.upsert(&record)?;

        if let Some(dedup_id) = dedup_id {
            self.dedup_handler()?
                .remove_from_dedup_record(&dedup_id, &record.id)?;
        }

        let metadata = self.records.create(
            &record.format,
            record.effective_data(),
            &record.oai_id,
            &record.source_id,
        )?;
        let host_ids = metadata.host_record_ids();
        if host_ids.is_empty() {
            return Ok(());
        }

        let settings = self.sources.get(&record.source_id)?;
        let hosts = RecordFilter::hosts(settings.linked_host_sources(), host_ids);
        if defer_host_update {
            let n = self
                .store
                .update_many(&hosts.deleted(false), &RecordPatch::flag_update_needed())?;
            log::debug!("{}: deferred update on {n} host record(s)", record.id);
        } else {
            let n = self
                .store
                .update_many(&hosts, &RecordPatch::touch(self.store.now()))?;
            log::debug!("{}: touched {n} host record(s)", record.id);
        }
        Ok(())
    }

    /// Retire every live record stored under `(source_id, oai_id)`.
    pub fn delete_by_oai_id(&self, source_id: &str, oai_id: &str) -> Result<usize> {
        let records = self.store.find(
            &RecordFilter::new()
                .source(source_id)
                .oai_id(oai_id)
                .deleted(false),
        )?;
        if records.is_empty() {
            log::warn!("{source_id}: delete for '{oai_id}' matched no stored record");
        }

        let count = records.len();
        for record in records {
            self.mark_record_deleted(record, false)?;
        }
        Ok(count)
    }

    /// Clear `mark` on the live records of a source before a full reharvest.
    pub fn reset_marks(&self, source_id: &str) -> Result<usize> {
        self.sources.get(source_id)?;
        let filter = RecordFilter::new().source(source_id).deleted(false).mark(true);
        self.store.update_many(&filter, &RecordPatch::clear_mark())
    }

    /// Retire the live records of a source the last full reharvest did not see.
    pub fn retire_unmarked(&self, source_id: &str) -> Result<usize> {
        self.sources.get(source_id)?;
        let unseen = self.store.find(
            &RecordFilter::new()
                .source(source_id)
                .deleted(false)
                .mark(false),
        )?;
        let count = unseen.len();
        for record in unseen {
            self.mark_record_deleted(record, true)?;
        }
        if count > 0 {
            log::info!("{source_id}: retired {count} record(s) missing from the reharvest");
        }
        Ok(count)
    }
}
