//! Persistent record table on DuckDB

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use duckdb::types::Value;
use duckdb::{Connection, ToSql};
use recstage_core::{
    DedupKeys, IngestError, MonotonicClock, RecordFilter, RecordPatch, RecordStore, Result,
    StoredRecord,
};

use crate::sql;

/// DuckDB-backed store. One connection, serialized behind a mutex.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
    clock: MonotonicClock,
}

/// Row as read from DuckDB, before JSON columns are decoded.
struct RawRecord {
    id: String,
    source_id: String,
    main_id: Option<String>,
    oai_id: String,
    format: String,
    original_data: Vec<u8>,
    normalized_data: Vec<u8>,
    host_record_ids: String,
    linking_id: String,
    dedup_id: Option<String>,
    dedup_keys: String,
    update_needed: bool,
    deleted: bool,
    mark: bool,
    created: i64,
    updated: i64,
    date: i64,
}

impl RawRecord {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            main_id: row.get(2)?,
            oai_id: row.get(3)?,
            format: row.get(4)?,
            original_data: row.get(5)?,
            normalized_data: row.get(6)?,
            host_record_ids: row.get(7)?,
            linking_id: row.get(8)?,
            dedup_id: row.get(9)?,
            dedup_keys: row.get(10)?,
            update_needed: row.get(11)?,
            deleted: row.get(12)?,
            mark: row.get(13)?,
            created: row.get(14)?,
            updated: row.get(15)?,
            date: row.get(16)?,
        })
    }

    fn decode(self) -> Result<StoredRecord> {
        let json_err = |e: serde_json::Error| {
            IngestError::Store(format!("corrupt json column in record {}: {e}", self.id))
        };
        let host_record_ids: Vec<String> =
            serde_json::from_str(&self.host_record_ids).map_err(json_err)?;
        let linking_id: Vec<String> = serde_json::from_str(&self.linking_id).map_err(json_err)?;
        let dedup_keys: DedupKeys = serde_json::from_str(&self.dedup_keys).map_err(json_err)?;
        Ok(StoredRecord {
            id: self.id,
            source_id: self.source_id,
            main_id: self.main_id,
            oai_id: self.oai_id,
            format: self.format,
            original_data: self.original_data,
            normalized_data: self.normalized_data,
            host_record_ids,
            linking_id,
            dedup_id: self.dedup_id,
            dedup_keys,
            update_needed: self.update_needed,
            deleted: self.deleted,
            mark: self.mark,
            created: from_micros(self.created),
            updated: from_micros(self.updated),
            date: from_micros(self.date),
        })
    }
}

fn from_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_default()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(IngestError::store)
}

fn as_params(values: &[Value]) -> Vec<&dyn ToSql> {
    values.iter().map(|v| v as &dyn ToSql).collect()
}

impl DuckDbStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                IngestError::Store(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            IngestError::Store(format!("failed to open DuckDB {}: {e}", path.display()))
        })?;
        log::debug!("opened record store {}", path.display());
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| IngestError::Store(format!("failed to open DuckDB in-memory: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(sql::create_schema())
            .map_err(|e| IngestError::Store(format!("failed to create schema: {e}")))?;

        // Timestamps handed out after a reopen must stay above stored ones.
        let last: Option<i64> = conn
            .query_row(sql::max_updated(), [], |row| row.get(0))
            .map_err(IngestError::store)?;
        let clock = MonotonicClock::new();
        if let Some(last) = last {
            clock.advance_past(from_micros(last));
        }

        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| IngestError::Store("duckdb connection lock poisoned".into()))
    }
}

impl RecordStore for DuckDbStore {
    fn get_by_id(&self, id: &str) -> Result<Option<StoredRecord>> {
        let conn = self.lock()?;
        match conn.query_row(&sql::select_by_id(), [id], RawRecord::from_row) {
            Ok(raw) => raw.decode().map(Some),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(IngestError::store(e)),
        }
    }

    fn upsert(&self, record: &StoredRecord) -> Result<()> {
        let host_record_ids = to_json(&record.host_record_ids)?;
        let linking_id = to_json(&record.linking_id)?;
        let dedup_keys = to_json(&record.dedup_keys)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(IngestError::store)?;
        tx.execute(
            &sql::upsert_record(),
            duckdb::params![
                record.id,
                record.source_id,
                record.main_id,
                record.oai_id,
                record.format,
                record.original_data,
                record.normalized_data,
                host_record_ids,
                linking_id,
                record.dedup_id,
                dedup_keys,
                record.update_needed,
                record.deleted,
                record.mark,
                record.created.timestamp_micros(),
                record.updated.timestamp_micros(),
                record.date.timestamp_micros(),
            ],
        )
        .map_err(|e| IngestError::Store(format!("failed to upsert {}: {e}", record.id)))?;
        tx.execute(sql::delete_links(), [&record.id])
            .map_err(IngestError::store)?;
        for linking_id in &record.linking_id {
            tx.execute(sql::insert_link(), [&record.id, linking_id])
                .map_err(IngestError::store)?;
        }
        tx.commit().map_err(IngestError::store)
    }

    fn update_many(&self, filter: &RecordFilter, patch: &RecordPatch) -> Result<usize> {
        if filter.is_empty_match() {
            return Ok(0);
        }
        let Some((stmt, values)) = sql::update_where(filter, patch) else {
            return self.count(filter);
        };
        let conn = self.lock()?;
        conn.execute(&stmt, as_params(&values).as_slice())
            .map_err(|e| IngestError::Store(format!("batch update failed: {e}")))
    }

    fn find(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>> {
        if filter.is_empty_match() {
            return Ok(Vec::new());
        }
        let (query, values) = sql::select_where(filter);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query).map_err(IngestError::store)?;
        let rows = stmt
            .query_map(as_params(&values).as_slice(), RawRecord::from_row)
            .map_err(IngestError::store)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(IngestError::store)?;
        rows.into_iter().map(RawRecord::decode).collect()
    }

    fn count(&self, filter: &RecordFilter) -> Result<usize> {
        if filter.is_empty_match() {
            return Ok(0);
        }
        let (query, values) = sql::count_where(filter);
        let conn = self.lock()?;
        let n: i64 = conn
            .query_row(&query, as_params(&values).as_slice(), |row| row.get(0))
            .map_err(IngestError::store)?;
        Ok(n as usize)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
