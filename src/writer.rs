use std::io;
use std::path::Path;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SiltError};
use crate::filter::EntryFilter;
use crate::query::{self, LogEntry};
use crate::schema::{MetaKeys, Schema};
use crate::value::{MetaValue, ValueKind};

const CREATE_LOG_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS log_entries(
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  date TIMESTAMP NOT NULL,
  level VARCHAR(255) NOT NULL,
  session VARCHAR(255)
);

CREATE TABLE IF NOT EXISTS log_entries_meta(
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  log_entry_id INTEGER NOT NULL,
  type INTEGER NOT NULL,
  meta_key_id INTEGER,
  name VARCHAR(255),
  int_value INTEGER,
  real_value REAL,
  text_value TEXT,
  blob_value BLOB
);
CREATE INDEX IF NOT EXISTS log_entries_meta_log_entry_id_idx ON log_entries_meta (log_entry_id);
CREATE INDEX IF NOT EXISTS log_entries_meta_type_idx ON log_entries_meta (type);
CREATE INDEX IF NOT EXISTS log_entries_meta_name_idx ON log_entries_meta (name);

CREATE TABLE IF NOT EXISTS meta_keys(
  id INTEGER PRIMARY KEY NOT NULL,
  key VARCHAR(255)
);
CREATE UNIQUE INDEX IF NOT EXISTS meta_keys_key_idx ON meta_keys (key);
"#;

const CREATE_TYPE_ENUM: &str = r#"
CREATE TABLE IF NOT EXISTS type_enum(
  type VARCHAR(255) PRIMARY KEY,
  seq INTEGER NOT NULL
);
"#;

/// Decomposes JSON-shaped log records into the relational layout and
/// reassembles them on read.
///
/// Each record buffer is one flat JSON object. `level` and `session` land
/// as columns of `log_entries`; every other field becomes one typed row of
/// `log_entries_meta`. Field names the schema has interned are stored by
/// id, the rest carry the literal name. Writing never interns a new key;
/// interning happens through [`MetaKeys::add`] on the supplied schema
/// before [`init`](LogWriter::init) persists it.
pub struct LogWriter {
    conn: Connection,
    schema: Schema,
}

impl LogWriter {
    /// Wraps an existing connection. Call [`init`](LogWriter::init) before
    /// the first write.
    pub fn new(conn: Connection, schema: Schema) -> Self {
        Self { conn, schema }
    }

    /// Opens (or creates) a database file and wraps it.
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )?;
        Ok(Self::new(conn, schema))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn schema_mut(&mut self) -> &mut Schema {
        &mut self.schema
    }

    /// Creates the tables and indexes, persists the supplied registry,
    /// seeds the `type_enum` lookup table and loads the registry back from
    /// storage. Safe to run against an existing database; nothing is
    /// created twice and the supplied registry wins over persisted rows
    /// with the same id.
    pub fn init(&mut self) -> Result<()> {
        self.conn.execute_batch(CREATE_LOG_TABLES)?;
        self.save_meta_keys()?;
        self.seed_type_enum()?;
        self.load_meta_keys()?;
        debug!(meta_keys = self.schema.meta_keys.len(), "log store initialized");
        Ok(())
    }

    /// Writes one record inside a single transaction. Parse the buffer,
    /// insert the entry row stamped with the ingestion time, insert one
    /// meta row per extra field. Any failure rolls the whole record back;
    /// there is no partially written entry.
    pub fn write_record(&mut self, buf: &[u8]) -> Result<()> {
        let record: Map<String, Value> = serde_json::from_slice(buf)?;

        let level = record.get("level").and_then(Value::as_str).map(str::to_owned);
        let session = record.get("session").and_then(Value::as_str).map(str::to_owned);

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO log_entries(date, level, session) VALUES (?1, ?2, ?3)",
            params![Utc::now(), level, session],
        )?;
        let entry_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO log_entries_meta\
                 (log_entry_id, type, name, meta_key_id, int_value, real_value, text_value, blob_value) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (name, value) in record {
                if name == "level" || name == "session" {
                    continue;
                }
                let value = MetaValue::from(value);
                let kind = value.kind();
                let (real, text, blob): (Option<f64>, Option<String>, Option<Vec<u8>>) =
                    match value {
                        MetaValue::Real(x) => (Some(x), None, None),
                        MetaValue::Text(s) => (None, Some(s), None),
                        MetaValue::Blob(b) => (None, None, Some(b)),
                        MetaValue::Json(v) => (None, None, Some(serde_json::to_vec(&v)?)),
                    };
                let interned = self.schema.meta_keys.get(&name).map(|key| key.id);
                let literal = if interned.is_some() { None } else { Some(name) };
                // no kind writes int_value; the column stays NULL
                stmt.execute(params![
                    entry_id,
                    kind.seq(),
                    literal,
                    interned,
                    Option::<i64>::None,
                    real,
                    text,
                    blob,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Reads back entries matching `filter` (all entries when `None`),
    /// sorted ascending by id, with their meta maps reassembled.
    pub fn entries(&self, filter: Option<&EntryFilter>) -> Result<Vec<LogEntry>> {
        query::fetch_entries(&self.conn, &self.schema.meta_keys, filter)
    }

    /// Releases the database handle.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_conn, e)| SiltError::from(e))
    }

    /// Upserts every registered meta key, keyed by id. The in-memory
    /// registry is authoritative; a persisted row under the same id is
    /// overwritten without any drift check.
    fn save_meta_keys(&self) -> Result<()> {
        if self.schema.meta_keys.is_empty() {
            return Ok(());
        }
        let mut stmt = self
            .conn
            .prepare("INSERT OR REPLACE INTO meta_keys(id, key) VALUES (?1, ?2)")?;
        for key in self.schema.meta_keys.iter() {
            stmt.execute(params![key.id, key.name])?;
        }
        debug!(meta_keys = self.schema.meta_keys.len(), "meta key registry saved");
        Ok(())
    }

    /// Replaces the in-memory registry with the persisted table. A
    /// conflicting persisted pair surfaces as [`SiltError::KeyConflict`].
    fn load_meta_keys(&mut self) -> Result<()> {
        let mut loaded = MetaKeys::new();
        {
            let mut stmt = self.conn.prepare("SELECT id, key FROM meta_keys")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, name) = row?;
                loaded.add_with_id(&name, id)?;
            }
        }
        debug!(meta_keys = loaded.len(), "meta key registry loaded");
        self.schema.meta_keys = loaded;
        Ok(())
    }

    fn seed_type_enum(&self) -> Result<()> {
        self.conn.execute_batch(CREATE_TYPE_ENUM)?;
        let mut stmt = self
            .conn
            .prepare("INSERT OR IGNORE INTO type_enum(type, seq) VALUES (?1, ?2)")?;
        for kind in ValueKind::ALL {
            stmt.execute(params![kind.as_str(), kind.seq()])?;
        }
        Ok(())
    }
}

/// Byte-stream entry point for logging pipelines that write one encoded
/// record per call.
impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_record(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
