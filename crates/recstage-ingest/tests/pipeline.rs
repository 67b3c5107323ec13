//! Pipeline scenarios over the in-memory store with a line-based mock format
//!
//! Mock payload: one `key=value` per line. `id` is the local id, `host` a
//! host record id, `link` a linking id (defaults to the id), `suppressed`
//! marks a suppressed record. A `---` line separates chunks for the
//! `lines` splitter.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use recstage_core::{
    Chunks, DataSourceConfig, DataSources, DedupHandler, IngestError, MetadataRecord, PreTransform,
    RecordFactory, RecordFilter, RecordSplitter, RecordStore, Result, SplitterFactory,
    StoredRecord, TransformFactory,
};
use recstage_ingest::IngestionPipeline;
use recstage_store::MemoryStore;

// --- mock collaborators ---

struct KvRecord {
    fields: Vec<(String, String)>,
}

impl KvRecord {
    fn values(&self, key: &str) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl MetadataRecord for KvRecord {
    fn id(&self) -> String {
        self.values("id").into_iter().next().unwrap_or_default()
    }

    fn suppressed(&self) -> bool {
        self.values("suppressed").iter().any(|v| v.trim() == "true")
    }

    fn host_record_ids(&self) -> Vec<String> {
        recstage_core::unique_ids(self.values("host"))
    }

    fn linking_ids(&self) -> Vec<String> {
        let links = self.values("link");
        if links.is_empty() {
            recstage_core::unique_ids([self.id()])
        } else {
            recstage_core::unique_ids(links)
        }
    }

    fn normalize(&mut self) {
        for (_, v) in &mut self.fields {
            *v = v.trim().to_string();
        }
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = String::new();
        for (k, v) in &self.fields {
            out.push_str(&format!("{k}={v}\n"));
        }
        Ok(out.into_bytes())
    }
}

struct KvFactory;

impl RecordFactory for KvFactory {
    fn create(
        &self,
        format: &str,
        data: &[u8],
        _oai_id: &str,
        _source_id: &str,
    ) -> Result<Box<dyn MetadataRecord>> {
        if format != "kv" {
            return Err(IngestError::Config(format!("no parser for '{format}'")));
        }
        let text = std::str::from_utf8(data).map_err(|e| IngestError::parse("kv", e))?;
        let mut fields = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (k, v) = line
                .split_once('=')
                .ok_or_else(|| IngestError::parse("kv", format!("bad line '{line}'")))?;
            fields.push((k.trim().to_string(), v.to_string()));
        }
        Ok(Box::new(KvRecord { fields }))
    }
}

struct LineSplitter;

impl RecordSplitter for LineSplitter {
    fn split<'a>(&'a self, payload: &'a [u8]) -> Result<Chunks<'a>> {
        let text = std::str::from_utf8(payload).map_err(|e| IngestError::parse("lines", e))?;
        Ok(Box::new(
            text.split("---\n")
                .filter(|c| !c.trim().is_empty())
                .map(|c| Ok(c.as_bytes().to_vec())),
        ))
    }
}

struct Splitters;

impl SplitterFactory for Splitters {
    fn splitter(&self, name: &str) -> Result<Arc<dyn RecordSplitter>> {
        match name {
            "lines" => Ok(Arc::new(LineSplitter)),
            _ => Err(IngestError::Config(format!("unknown splitter '{name}'"))),
        }
    }
}

/// Drops a leading `envelope` line.
struct StripEnvelope;

impl PreTransform for StripEnvelope {
    fn transform(&self, data: &[u8]) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(data).map_err(|e| IngestError::parse("strip", e))?;
        Ok(text
            .strip_prefix("envelope\n")
            .unwrap_or(text)
            .as_bytes()
            .to_vec())
    }
}

struct Transforms;

impl TransformFactory for Transforms {
    fn transform(&self, name: &str) -> Result<Arc<dyn PreTransform>> {
        match name {
            "strip" => Ok(Arc::new(StripEnvelope)),
            _ => Err(IngestError::Config(format!("unknown transform '{name}'"))),
        }
    }
}

#[derive(Default)]
struct MockDedup {
    needs_processing: bool,
    key_updates: Mutex<Vec<String>>,
    removals: Mutex<Vec<(String, String)>>,
}

impl DedupHandler for MockDedup {
    fn update_dedup_candidate_keys(
        &self,
        record: &mut StoredRecord,
        _metadata: &dyn MetadataRecord,
    ) -> Result<bool> {
        self.key_updates.lock().unwrap().push(record.id.clone());
        record.dedup_keys.id_keys = record.linking_id.clone();
        Ok(self.needs_processing)
    }

    fn remove_from_dedup_record(&self, dedup_id: &str, record_id: &str) -> Result<()> {
        self.removals
            .lock()
            .unwrap()
            .push((dedup_id.to_string(), record_id.to_string()));
        Ok(())
    }
}

// --- fixture ---

fn source(dedup: bool) -> DataSourceConfig {
    DataSourceConfig {
        institution: Some("Library".into()),
        format: Some("kv".into()),
        dedup,
        ..Default::default()
    }
}

fn split_source(dedup: bool) -> DataSourceConfig {
    DataSourceConfig {
        record_splitter: Some("lines".into()),
        ..source(dedup)
    }
}

struct Fixture {
    store: MemoryStore,
    dedup: MockDedup,
    sources: DataSources,
}

impl Fixture {
    fn new(configs: Vec<(&str, DataSourceConfig)>, needs_processing: bool) -> Self {
        let configs: BTreeMap<String, DataSourceConfig> = configs
            .into_iter()
            .map(|(id, cfg)| (id.to_string(), cfg))
            .collect();
        Self {
            store: MemoryStore::new(),
            dedup: MockDedup {
                needs_processing,
                ..Default::default()
            },
            sources: DataSources::resolve(&configs).unwrap(),
        }
    }

    fn pipeline(&self) -> IngestionPipeline<'_> {
        IngestionPipeline::new(&self.store, &KvFactory, &self.sources)
            .with_splitters(&Splitters)
            .with_transforms(&Transforms)
            .with_dedup_handler(&self.dedup)
    }

    fn get(&self, id: &str) -> StoredRecord {
        self.store.get_by_id(id).unwrap().unwrap()
    }

    fn all(&self) -> Vec<StoredRecord> {
        self.store.find(&RecordFilter::new()).unwrap()
    }
}

fn chunks(parts: &[&str]) -> Vec<u8> {
    parts.join("---\n").into_bytes()
}

// --- scenarios ---

#[test]
fn single_record_end_to_end() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    let n = fx
        .pipeline()
        .store_record("libA", "oai:lib:1", false, b"id=1\ntitle=Book\n")
        .unwrap();

    assert_eq!(n, 1);
    let all = fx.all();
    assert_eq!(all.len(), 1);
    let rec = &all[0];
    assert_eq!(rec.id, "libA.1");
    assert_eq!(rec.oai_id, "oai:lib:1");
    assert_eq!(rec.format, "kv");
    assert!(!rec.deleted);
    assert!(rec.main_id.is_none());
    assert!(rec.update_needed);
    assert_eq!(rec.linking_id, vec!["1"]);
    assert_eq!(*fx.dedup.key_updates.lock().unwrap(), vec!["libA.1"]);
}

#[test]
fn update_needed_follows_dedup_handler() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    fx.pipeline()
        .store_record("libA", "oai:lib:1", false, b"id=1\n")
        .unwrap();
    assert!(!fx.get("libA.1").update_needed);
}

#[test]
fn repeated_store_is_idempotent() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "oai:lib:1", false, b"id=1\n").unwrap();
    let first = fx.get("libA.1");
    pipeline.store_record("libA", "oai:lib:1", false, b"id=1\n").unwrap();
    let second = fx.get("libA.1");

    assert_eq!(fx.store.len(), 1);
    assert_eq!(second.created, first.created);
    assert!(second.updated > first.updated);
    assert!(second.date > first.date);
    assert_eq!(second.original_data, first.original_data);
}

#[test]
fn local_id_is_prefixed() {
    let mut cfg = source(false);
    cfg.id_prefix = Some("lib".into());
    let fx = Fixture::new(vec![("libA", cfg)], false);
    fx.pipeline()
        .store_record("libA", "oai:1", false, b"id=1\n")
        .unwrap();
    assert_eq!(fx.get("lib.1").source_id, "libA");
    assert!(fx.store.get_by_id("libA.1").unwrap().is_none());
}

#[test]
fn oai_id_is_the_fallback_local_id() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    fx.pipeline()
        .store_record("libA", "oai:lib:9", false, b"title=No id\n")
        .unwrap();
    assert!(fx.store.get_by_id("libA.oai:lib:9").unwrap().is_some());
}

#[test]
fn normalization_noop_is_compacted() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o1", false, b"id=1\ntitle=Clean\n").unwrap();
    pipeline.store_record("libA", "o2", false, b"id=2\ntitle=  Padded \n").unwrap();

    let clean = fx.get("libA.1");
    assert!(clean.normalized_data.is_empty());
    assert_eq!(clean.original_data, b"id=1\ntitle=Clean\n");

    let padded = fx.get("libA.2");
    assert_eq!(padded.original_data, b"id=2\ntitle=  Padded \n");
    assert_eq!(padded.normalized_data, b"id=2\ntitle=Padded\n");
    assert_eq!(padded.effective_data(), b"id=2\ntitle=Padded\n");
}

#[test]
fn pre_transform_runs_before_parse() {
    let mut cfg = source(false);
    cfg.pre_transformation = Some("strip".into());
    let fx = Fixture::new(vec![("libA", cfg)], false);
    fx.pipeline()
        .store_record("libA", "o1", false, b"envelope\nid=1\ntitle= T\n")
        .unwrap();

    let rec = fx.get("libA.1");
    assert_eq!(rec.original_data, b"id=1\ntitle= T\n");
    assert_eq!(rec.normalized_data, b"id=1\ntitle=T\n");
}

#[test]
fn split_batch_shares_main_id() {
    let fx = Fixture::new(vec![("arch", split_source(false))], false);
    let n = fx
        .pipeline()
        .store_record(
            "arch",
            "oai:fa:1",
            false,
            &chunks(&["id=M\n", "id=C1\nhost=M\n", "id=C2\nhost=M\n"]),
        )
        .unwrap();

    assert_eq!(n, 3);
    let all = fx.all();
    let roots: Vec<_> = all.iter().filter(|r| r.main_id.is_none()).collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0].id, "arch.M");
    for rec in all.iter().filter(|r| r.id != "arch.M") {
        assert_eq!(rec.main_id.as_deref(), Some("arch.M"));
        assert_eq!(rec.oai_id, "oai:fa:1");
    }
}

#[test]
fn stale_children_are_retired() {
    let fx = Fixture::new(vec![("arch", split_source(true))], true);
    let pipeline = fx.pipeline();
    let c1 = "id=C1\nhost=M\n";
    let c2 = "id=C2\nhost=M\n";
    let c3 = "id=C3\nhost=M\n";
    pipeline
        .store_record("arch", "oai:fa:1", false, &chunks(&["id=M\n", c1, c2, c3]))
        .unwrap();
    pipeline
        .store_record("arch", "oai:fa:1", false, &chunks(&["id=M\n", c1, c2]))
        .unwrap();

    assert!(fx.get("arch.C3").deleted);
    assert!(!fx.get("arch.C3").update_needed);
    assert!(!fx.get("arch.C1").deleted);
    assert!(!fx.get("arch.C2").deleted);
    assert!(!fx.get("arch.M").deleted);
}

#[test]
fn failed_batch_keeps_written_chunks_and_skips_sweep() {
    let fx = Fixture::new(vec![("arch", split_source(false))], false);
    let pipeline = fx.pipeline();
    let c1 = "id=C1\nhost=M\n";
    let c2 = "id=C2\nhost=M\n";
    let c3 = "id=C3\nhost=M\n";
    pipeline
        .store_record("arch", "oai:fa:1", false, &chunks(&["id=M\n", c1, c2, c3]))
        .unwrap();

    let err = pipeline
        .store_record("arch", "oai:fa:1", false, &chunks(&["id=M\n", c1, "broken\n", c2]))
        .unwrap_err();
    assert!(matches!(err, IngestError::Parse { .. }));
    for id in ["arch.M", "arch.C1", "arch.C2", "arch.C3"] {
        assert!(!fx.get(id).deleted, "{id} retired by an aborted batch");
    }

    pipeline
        .store_record("arch", "oai:fa:1", false, &chunks(&["id=M\n", c1, c2]))
        .unwrap();
    assert!(fx.get("arch.C3").deleted);
    assert!(!fx.get("arch.C1").deleted);
    assert!(!fx.get("arch.C2").deleted);
}

#[test]
fn stale_enrolled_sibling_leaves_dedup_group() {
    let fx = Fixture::new(vec![("arch", split_source(true))], true);
    let pipeline = fx.pipeline();
    pipeline
        .store_record("arch", "oai:fa:2", false, &chunks(&["id=M\n", "id=S\n", "id=T\n"]))
        .unwrap();
    let mut sibling = fx.get("arch.S");
    assert_eq!(sibling.main_id.as_deref(), Some("arch.M"));
    sibling.dedup_id = Some("group-9".into());
    fx.store.upsert(&sibling).unwrap();

    pipeline
        .store_record("arch", "oai:fa:2", false, &chunks(&["id=M\n", "id=T\n"]))
        .unwrap();

    let sibling = fx.get("arch.S");
    assert!(sibling.deleted);
    assert!(!sibling.update_needed);
    assert!(sibling.dedup_id.is_none());
    assert!(!fx.get("arch.T").deleted);
    assert_eq!(
        *fx.dedup.removals.lock().unwrap(),
        vec![("group-9".to_string(), "arch.S".to_string())]
    );
}

#[test]
fn kept_hierarchy_members_survive() {
    let mut cfg = split_source(false);
    cfg.keep_missing_hierarchy_members = true;
    let fx = Fixture::new(vec![("arch", cfg)], false);
    let pipeline = fx.pipeline();
    pipeline
        .store_record("arch", "o", false, &chunks(&["id=M\n", "id=C1\n", "id=C2\n"]))
        .unwrap();
    pipeline
        .store_record("arch", "o", false, &chunks(&["id=M\n", "id=C1\n"]))
        .unwrap();
    assert!(!fx.get("arch.C2").deleted);
}

#[test]
fn single_chunk_harvest_does_not_sweep() {
    let fx = Fixture::new(vec![("arch", split_source(false))], false);
    let pipeline = fx.pipeline();
    pipeline
        .store_record("arch", "o", false, &chunks(&["id=M\n", "id=C1\n"]))
        .unwrap();
    pipeline.store_record("arch", "o", false, b"id=M\n").unwrap();
    assert!(!fx.get("arch.C1").deleted);
}

#[test]
fn oai_delete_fans_out() {
    let fx = Fixture::new(vec![("s", split_source(true))], true);
    let pipeline = fx.pipeline();
    pipeline
        .store_record("s", "o42", false, &chunks(&["id=1\n", "id=2\n", "id=3\n"]))
        .unwrap();
    pipeline.store_record("s", "o43", false, b"id=4\n").unwrap();

    let n = pipeline.store_record("s", "o42", true, b"").unwrap();
    assert_eq!(n, 3);
    for id in ["s.1", "s.2", "s.3"] {
        let rec = fx.get(id);
        assert!(rec.deleted);
        assert!(!rec.update_needed);
    }
    assert!(!fx.get("s.4").deleted);

    // already retired
    assert_eq!(pipeline.delete_by_oai_id("s", "o42").unwrap(), 0);
}

#[test]
fn deleted_flag_without_oai_id_stores_deleted_record() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    let n = fx.pipeline().store_record("libA", "", true, b"id=1\n").unwrap();
    assert_eq!(n, 1);
    let rec = fx.get("libA.1");
    assert!(rec.deleted);
    assert!(!rec.update_needed);
    assert!(fx.dedup.key_updates.lock().unwrap().is_empty());
}

#[test]
fn suppressed_record_is_stored_deleted() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    fx.pipeline()
        .store_record("libA", "o1", false, b"id=1\nsuppressed=true\n")
        .unwrap();
    let rec = fx.get("libA.1");
    assert!(rec.deleted);
    assert!(!rec.update_needed);
    assert!(fx.dedup.key_updates.lock().unwrap().is_empty());
}

#[test]
fn deleting_enrolled_record_leaves_dedup_group() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "", false, b"id=1\n").unwrap();
    let mut rec = fx.get("libA.1");
    rec.dedup_id = Some("group-1".into());
    fx.store.upsert(&rec).unwrap();

    pipeline.store_record("libA", "", true, b"id=1\n").unwrap();

    let rec = fx.get("libA.1");
    assert!(rec.dedup_id.is_none());
    assert_eq!(
        *fx.dedup.removals.lock().unwrap(),
        vec![("group-1".to_string(), "libA.1".to_string())]
    );
}

#[test]
fn component_flags_its_host() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    assert!(!fx.get("libA.H1").update_needed);

    pipeline
        .store_record("libA", "o-c", false, b"id=C1\nhost=H1\n")
        .unwrap();

    assert!(fx.get("libA.H1").update_needed);
    let component = fx.get("libA.C1");
    assert!(!component.update_needed);
    assert!(component.dedup_id.is_none());
    assert_eq!(*fx.dedup.key_updates.lock().unwrap(), vec!["libA.H1"]);
}

#[test]
fn component_does_not_revive_deleted_host() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    pipeline.store_record("libA", "o-h", true, b"").unwrap();
    pipeline
        .store_record("libA", "o-c", false, b"id=C1\nhost=H1\n")
        .unwrap();

    let host = fx.get("libA.H1");
    assert!(host.deleted);
    assert!(!host.update_needed);
}

#[test]
fn component_flags_hosts_in_linked_sources() {
    let mut journals = source(true);
    journals.component_part_sources = vec!["articles".into()];
    let fx = Fixture::new(vec![("journals", journals), ("articles", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("journals", "j", false, b"id=J1\nlink=ISSN-1\n").unwrap();
    // same linking id in the component's own source: not a linked host source
    pipeline.store_record("articles", "x", false, b"id=X\nlink=ISSN-1\n").unwrap();

    pipeline
        .store_record("articles", "a", false, b"id=A1\nhost=ISSN-1\n")
        .unwrap();

    assert!(fx.get("journals.J1").update_needed);
    assert!(!fx.get("articles.X").update_needed);
    assert!(!fx.get("articles.A1").update_needed);
}

#[test]
fn component_leaves_former_dedup_group() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o", false, b"id=1\n").unwrap();
    let mut rec = fx.get("libA.1");
    rec.dedup_id = Some("group-9".into());
    fx.store.upsert(&rec).unwrap();

    pipeline.store_record("libA", "o", false, b"id=1\nhost=H\n").unwrap();

    assert!(fx.get("libA.1").dedup_id.is_none());
    assert_eq!(fx.dedup.removals.lock().unwrap().len(), 1);
}

#[test]
fn dedup_disabled_touches_hosts_only() {
    let fx = Fixture::new(vec![("libA", source(false))], true);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    let mut host = fx.get("libA.H1");
    host.dedup_keys.title_keys = vec!["stale".into()];
    fx.store.upsert(&host).unwrap();
    let before = fx.get("libA.H1").updated;

    pipeline
        .store_record("libA", "o-c", false, b"id=C1\nhost=H1\n")
        .unwrap();

    let host = fx.get("libA.H1");
    assert!(host.updated > before);
    assert!(!host.update_needed);
    assert!(!fx.get("libA.C1").update_needed);
    assert!(fx.dedup.key_updates.lock().unwrap().is_empty());

    // re-harvest clears derived keys left over from dedup-enabled days
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    assert!(fx.get("libA.H1").dedup_keys.is_empty());
}

#[test]
fn deferred_delete_flags_hosts() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    pipeline
        .store_record("libA", "o-c", false, b"id=C1\nhost=H1\n")
        .unwrap();
    let mut host = fx.get("libA.H1");
    host.update_needed = false;
    fx.store.upsert(&host).unwrap();

    pipeline.mark_record_deleted(fx.get("libA.C1"), true).unwrap();

    assert!(fx.get("libA.C1").deleted);
    assert!(fx.get("libA.H1").update_needed);
}

#[test]
fn immediate_delete_touches_hosts() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o-h", false, b"id=H1\n").unwrap();
    pipeline
        .store_record("libA", "o-c", false, b"id=C1\nhost=H1\n")
        .unwrap();
    let mut host = fx.get("libA.H1");
    host.update_needed = false;
    fx.store.upsert(&host).unwrap();
    let before = host.updated;

    pipeline.mark_record_deleted(fx.get("libA.C1"), false).unwrap();

    let host = fx.get("libA.H1");
    assert!(!host.update_needed);
    assert!(host.updated > before);
}

#[test]
fn mark_record_deleted_is_idempotent() {
    let fx = Fixture::new(vec![("libA", source(true))], true);
    let pipeline = fx.pipeline();
    pipeline.store_record("libA", "o", false, b"id=1\n").unwrap();
    let mut rec = fx.get("libA.1");
    rec.dedup_id = Some("g".into());
    fx.store.upsert(&rec).unwrap();

    pipeline.mark_record_deleted(fx.get("libA.1"), false).unwrap();
    pipeline.mark_record_deleted(fx.get("libA.1"), false).unwrap();

    let rec = fx.get("libA.1");
    assert!(rec.deleted);
    assert!(!rec.update_needed);
    assert!(rec.dedup_id.is_none());
    assert_eq!(fx.dedup.removals.lock().unwrap().len(), 1);
}

#[test]
fn deleted_records_never_pending() {
    let fx = Fixture::new(vec![("arch", split_source(true))], true);
    let pipeline = fx.pipeline();
    pipeline
        .store_record(
            "arch",
            "o1",
            false,
            &chunks(&["id=M\n", "id=C1\nhost=M\n", "id=C2\nhost=M\n"]),
        )
        .unwrap();
    pipeline
        .store_record("arch", "o1", false, &chunks(&["id=M\n", "id=C1\nhost=M\n"]))
        .unwrap();
    pipeline.store_record("arch", "o1", true, b"").unwrap();
    pipeline.store_record("arch", "o2", false, b"id=S\nsuppressed=true\n").unwrap();

    let all = fx.all();
    assert!(all.iter().all(|r| r.deleted));
    assert!(all.iter().all(|r| !r.update_needed));
}

#[test]
fn missing_id_reports_previous_stored_id() {
    let fx = Fixture::new(vec![("arch", split_source(false))], false);
    let err = fx
        .pipeline()
        .store_record("arch", "", false, &chunks(&["id=1\n", "title=x\n", "id=3\n"]))
        .unwrap_err();

    match err {
        IngestError::Identification {
            source_id,
            previous_id,
            ..
        } => {
            assert_eq!(source_id, "arch");
            assert_eq!(previous_id.as_deref(), Some("arch.1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    // chunks before the failure stay persisted
    assert_eq!(fx.store.len(), 1);
}

#[test]
fn missing_dedup_handler_is_config_error() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    let pipeline = IngestionPipeline::new(&fx.store, &KvFactory, &fx.sources);
    let err = pipeline.store_record("libA", "o", false, b"id=1\n").unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
    assert!(fx.store.is_empty());
}

#[test]
fn unknown_source_is_config_error() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    let err = fx.pipeline().store_record("nope", "o", false, b"id=1\n").unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}

#[test]
fn splitter_without_factory_is_config_error() {
    let fx = Fixture::new(vec![("arch", split_source(false))], false);
    let pipeline =
        IngestionPipeline::new(&fx.store, &KvFactory, &fx.sources).with_dedup_handler(&fx.dedup);
    let err = pipeline.store_record("arch", "o", false, b"id=1\n").unwrap_err();
    assert!(matches!(err, IngestError::Config(_)));
}

#[test]
fn parse_error_propagates() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    let err = fx
        .pipeline()
        .store_record("libA", "o", false, b"not a field line\n")
        .unwrap_err();
    assert!(matches!(err, IngestError::Parse { .. }));
    assert!(err.is_unit_local());
}

#[test]
fn full_reharvest_retires_unseen_records() {
    let fx = Fixture::new(vec![("libA", source(true))], false);
    let marking = fx.pipeline().mark_seen(true);
    for id in ["1", "2", "3"] {
        let payload = format!("id={id}\n");
        marking.store_record("libA", "", false, payload.as_bytes()).unwrap();
    }
    assert!(fx.all().iter().all(|r| r.mark));

    assert_eq!(marking.reset_marks("libA").unwrap(), 3);
    for id in ["1", "2"] {
        let payload = format!("id={id}\n");
        marking.store_record("libA", "", false, payload.as_bytes()).unwrap();
    }
    assert_eq!(marking.retire_unmarked("libA").unwrap(), 1);

    assert!(fx.get("libA.3").deleted);
    assert!(!fx.get("libA.1").deleted);
    assert!(fx.get("libA.2").mark);
}

#[test]
fn plain_import_leaves_mark_alone() {
    let fx = Fixture::new(vec![("libA", source(false))], false);
    fx.pipeline().store_record("libA", "", false, b"id=1\n").unwrap();
    assert!(!fx.get("libA.1").mark);
}
