use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::EntryFilter;
use crate::schema::MetaKeys;
use crate::value::{MetaValue, ValueKind};

/// A reconstructed log entry. `meta` is reassembled from the per-field
/// rows at read time; an entry written without extra fields comes back
/// with an empty map, not missing from the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub level: String,
    pub session: Option<String>,
    pub meta: HashMap<String, MetaValue>,
}

/// Two-phase read: fetch matching entries ordered by id, then fetch their
/// meta rows in one IN query and fold the decoded values back in. The
/// working set is keyed by entry id, so the result is explicitly re-sorted
/// before returning; map iteration order proves nothing.
pub(crate) fn fetch_entries(
    conn: &Connection,
    keys: &MetaKeys,
    filter: Option<&EntryFilter>,
) -> Result<Vec<LogEntry>> {
    let unfiltered = EntryFilter::new();
    let filter = filter.unwrap_or(&unfiltered);
    let clauses = filter.clauses(keys)?;

    let mut sql = String::from(if clauses.joins_meta {
        "SELECT DISTINCT le.id, le.date, le.level, le.session \
         FROM log_entries le \
         JOIN log_entries_meta lem ON lem.log_entry_id = le.id"
    } else {
        "SELECT le.id, le.date, le.level, le.session FROM log_entries le"
    });
    if !clauses.conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY le.id ASC");

    let mut entries: HashMap<i64, LogEntry> = HashMap::new();
    let mut ids: Vec<i64> = Vec::new();
    {
        let params: Vec<&dyn ToSql> = clauses.params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), |row| {
            Ok(LogEntry {
                id: row.get(0)?,
                date: row.get(1)?,
                level: row.get(2)?,
                session: row.get(3)?,
                meta: HashMap::new(),
            })
        })?;
        for entry in rows {
            let entry = entry?;
            ids.push(entry.id);
            entries.insert(entry.id, entry);
        }
    }
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT lem.log_entry_id, lem.type, lem.name, \
                lem.real_value, lem.text_value, lem.blob_value, mk.key \
         FROM log_entries_meta lem \
         LEFT JOIN meta_keys mk ON mk.id = lem.meta_key_id \
         WHERE lem.log_entry_id IN ({})",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let id_params: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
    let mut rows = stmt.query(id_params.as_slice())?;
    while let Some(row) = rows.next()? {
        let entry_id: i64 = row.get(0)?;
        let kind = ValueKind::from_seq(row.get(1)?)?;
        let name: Option<String> = row.get(2)?;
        let real: Option<f64> = row.get(3)?;
        let text: Option<String> = row.get(4)?;
        let blob: Option<Vec<u8>> = row.get(5)?;
        let interned_name: Option<String> = row.get(6)?;

        let value = match MetaValue::decode(kind, real, text, blob)? {
            Some(v) => v,
            None => {
                debug!(entry_id, "meta row holds no value, skipping");
                continue;
            }
        };
        let name = match name.or(interned_name) {
            Some(n) => n,
            None => {
                warn!(entry_id, "meta row has no resolvable key name, skipping");
                continue;
            }
        };
        let Some(entry) = entries.get_mut(&entry_id) else {
            continue;
        };
        entry.meta.insert(name, value);
    }

    let mut out: Vec<LogEntry> = entries.into_values().collect();
    out.sort_by_key(|entry| entry.id);
    Ok(out)
}
