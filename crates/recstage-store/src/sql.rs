//! SQL for the DuckDB record table.
//!
//! Layout:
//! - `record`: one row per stored record; id lists and dedup keys as JSON text,
//!   timestamps as microseconds since the epoch
//! - `record_link`: (record_id, linking_id) pairs so host lookups stay a
//!   single indexed `IN` query

use duckdb::types::Value;
use recstage_core::{RecordFilter, RecordPatch};

/// Column list shared by inserts and selects, in row-mapping order.
pub const RECORD_COLUMNS: &str = "\
    id, source_id, main_id, oai_id, format, \
    original_data, normalized_data, host_record_ids, linking_id, \
    dedup_id, dedup_keys, update_needed, deleted, mark, \
    created, updated, \"date\"";

/// Returns the SQL creating tables and indexes (idempotent).
///
/// `record` carries no secondary indexes: DuckDB rejects `INSERT OR REPLACE`
/// assignments to indexed columns.
pub fn create_schema() -> &'static str {
    "CREATE TABLE IF NOT EXISTS record (
       id VARCHAR PRIMARY KEY,
       source_id VARCHAR NOT NULL,
       main_id VARCHAR,
       oai_id VARCHAR NOT NULL,
       format VARCHAR NOT NULL,
       original_data BLOB NOT NULL,
       normalized_data BLOB NOT NULL,
       host_record_ids VARCHAR NOT NULL,
       linking_id VARCHAR NOT NULL,
       dedup_id VARCHAR,
       dedup_keys VARCHAR NOT NULL,
       update_needed BOOLEAN NOT NULL,
       deleted BOOLEAN NOT NULL,
       mark BOOLEAN NOT NULL,
       created BIGINT NOT NULL,
       updated BIGINT NOT NULL,
       \"date\" BIGINT NOT NULL
     );
     CREATE TABLE IF NOT EXISTS record_link (
       record_id VARCHAR NOT NULL,
       linking_id VARCHAR NOT NULL
     );
     CREATE INDEX IF NOT EXISTS record_link_idx ON record_link (linking_id);
     CREATE INDEX IF NOT EXISTS record_link_record_idx ON record_link (record_id);"
}

pub fn upsert_record() -> String {
    let placeholders = vec!["?"; 17].join(", ");
    format!("INSERT OR REPLACE INTO record ({RECORD_COLUMNS}) VALUES ({placeholders})")
}

pub fn delete_links() -> &'static str {
    "DELETE FROM record_link WHERE record_id = ?"
}

pub fn insert_link() -> &'static str {
    "INSERT INTO record_link (record_id, linking_id) VALUES (?, ?)"
}

pub fn select_by_id() -> String {
    format!("SELECT {RECORD_COLUMNS} FROM record WHERE id = ?")
}

pub fn max_updated() -> &'static str {
    "SELECT max(updated) FROM record"
}

fn in_list(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// WHERE clause (without the keyword) and its bound values.
pub fn where_clause(filter: &RecordFilter) -> (String, Vec<Value>) {
    let mut conds = Vec::new();
    let mut params = Vec::new();

    if let Some(sources) = &filter.source_ids {
        conds.push(format!("source_id IN ({})", in_list(sources.len())));
        params.extend(sources.iter().cloned().map(Value::Text));
    }
    if let Some(linking) = &filter.linking_ids {
        conds.push(format!(
            "id IN (SELECT record_id FROM record_link WHERE linking_id IN ({}))",
            in_list(linking.len())
        ));
        params.extend(linking.iter().cloned().map(Value::Text));
    }
    if let Some(main_id) = &filter.main_id {
        conds.push("main_id = ?".to_string());
        params.push(Value::Text(main_id.clone()));
    }
    if let Some(oai_id) = &filter.oai_id {
        conds.push("oai_id = ?".to_string());
        params.push(Value::Text(oai_id.clone()));
    }
    if let Some(deleted) = filter.deleted {
        conds.push("deleted = ?".to_string());
        params.push(Value::Boolean(deleted));
    }
    if let Some(mark) = filter.mark {
        conds.push("mark = ?".to_string());
        params.push(Value::Boolean(mark));
    }
    if let Some(t) = filter.updated_before {
        conds.push("updated < ?".to_string());
        params.push(Value::BigInt(t.timestamp_micros()));
    }

    if conds.is_empty() {
        ("true".to_string(), params)
    } else {
        (conds.join(" AND "), params)
    }
}

pub fn select_where(filter: &RecordFilter) -> (String, Vec<Value>) {
    let (cond, params) = where_clause(filter);
    (
        format!("SELECT {RECORD_COLUMNS} FROM record WHERE {cond} ORDER BY id"),
        params,
    )
}

pub fn count_where(filter: &RecordFilter) -> (String, Vec<Value>) {
    let (cond, params) = where_clause(filter);
    (format!("SELECT count(*) FROM record WHERE {cond}"), params)
}

/// Conditional batch UPDATE. `None` when the patch sets nothing.
///
/// SET expressions see pre-update values, so `update_needed` is computed
/// against the post-update `deleted` explicitly.
pub fn update_where(filter: &RecordFilter, patch: &RecordPatch) -> Option<(String, Vec<Value>)> {
    let mut sets = Vec::new();
    let mut params = Vec::new();

    if let Some(deleted) = patch.deleted {
        sets.push("deleted = ?".to_string());
        params.push(Value::Boolean(deleted));
    }
    if patch.deleted.is_some() || patch.update_needed.is_some() {
        let deleted_expr = if patch.deleted.is_some() { "?" } else { "deleted" };
        let pending_expr = if patch.update_needed.is_some() {
            "?"
        } else {
            "update_needed"
        };
        sets.push(format!(
            "update_needed = CASE WHEN {deleted_expr} THEN false ELSE {pending_expr} END"
        ));
        if let Some(deleted) = patch.deleted {
            params.push(Value::Boolean(deleted));
        }
        if let Some(pending) = patch.update_needed {
            params.push(Value::Boolean(pending));
        }
    }
    if let Some(updated) = patch.updated {
        sets.push("updated = ?".to_string());
        params.push(Value::BigInt(updated.timestamp_micros()));
    }
    if let Some(mark) = patch.mark {
        sets.push("mark = ?".to_string());
        params.push(Value::Boolean(mark));
    }

    if sets.is_empty() {
        return None;
    }

    let (cond, cond_params) = where_clause(filter);
    params.extend(cond_params);
    Some((
        format!("UPDATE record SET {} WHERE {cond}", sets.join(", ")),
        params,
    ))
}
