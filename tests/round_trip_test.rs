use std::io::Write;

use serde_json::json;
use silt::{LogWriter, MetaValue, Schema, SiltError};
use tempfile::tempdir;

fn open_writer(dir: &tempfile::TempDir, schema: Schema) -> LogWriter {
    let mut writer = LogWriter::open(dir.path().join("logs.db"), schema).expect("open db");
    writer.init().expect("init");
    writer
}

#[test]
fn round_trip_one_field_of_each_kind() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    let record = json!({
        "level": "info",
        "session": "s1",
        "count": 3,
        "ratio": 0.5,
        "user": "u1",
        "payload": {"a": [1, 2], "b": "x"},
        "tags": ["t1", "t2"],
        "ok": true,
        "gone": null,
    });
    writer
        .write_record(record.to_string().as_bytes())
        .expect("write");

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.level, "info");
    assert_eq!(entry.session.as_deref(), Some("s1"));

    assert_eq!(entry.meta["count"], MetaValue::Real(3.0));
    assert_eq!(entry.meta["ratio"], MetaValue::Real(0.5));
    assert_eq!(entry.meta["user"], MetaValue::Text("u1".into()));
    assert_eq!(
        entry.meta["payload"],
        MetaValue::Json(json!({"a": [1, 2], "b": "x"}))
    );
    assert_eq!(entry.meta["tags"], MetaValue::Json(json!(["t1", "t2"])));
    assert_eq!(entry.meta["ok"], MetaValue::Json(json!(true)));
    // a null field stores as a json row that decodes to nothing
    assert!(!entry.meta.contains_key("gone"));
    assert_eq!(entry.meta.len(), 6);
}

#[test]
fn documented_example_record() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    writer
        .write_record(br#"{"level":"info","session":"s1","user":"u1","count":3}"#)
        .expect("write");

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.level, "info");
    assert_eq!(entry.session.as_deref(), Some("s1"));
    assert_eq!(entry.meta.len(), 2);
    assert_eq!(entry.meta["user"], MetaValue::Text("u1".into()));
    assert_eq!(entry.meta["count"], MetaValue::Real(3.0));
}

#[test]
fn entry_without_extra_fields_reads_back_with_empty_meta() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    writer.write_record(br#"{"level":"warn"}"#).expect("write");

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, "warn");
    assert_eq!(entries[0].session, None);
    assert!(entries[0].meta.is_empty());
}

#[test]
fn malformed_buffer_persists_nothing() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    let err = writer.write_record(b"definitely not json").unwrap_err();
    assert!(matches!(err, SiltError::Malformed(_)));
    let err = writer.write_record(br#"["an array","not an object"]"#).unwrap_err();
    assert!(matches!(err, SiltError::Malformed(_)));

    assert!(writer.entries(None).expect("read").is_empty());

    writer.write_record(br#"{"level":"info"}"#).expect("write");
    assert_eq!(writer.entries(None).expect("read").len(), 1);
}

#[test]
fn interleaved_writes_read_back_sorted_by_id() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    for i in 0..20 {
        let level = if i % 3 == 0 { "error" } else { "info" };
        let record = json!({
            "level": level,
            "session": format!("s{}", i % 4),
            "seq": i,
        });
        writer
            .write_record(record.to_string().as_bytes())
            .expect("write");
    }

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 20);
    for pair in entries.windows(2) {
        assert!(pair[0].id < pair[1].id, "ids must be strictly ascending");
    }
}

#[test]
fn interned_key_round_trips_through_the_registry() {
    let dir = tempdir().expect("tempdir");
    let mut schema = Schema::new();
    let user = schema.meta_keys.add("user");
    let mut writer = open_writer(&dir, schema);

    writer
        .write_record(br#"{"level":"info","user":"u1","host":"h1"}"#)
        .expect("write");

    // the interned field stores no literal name, only the id, and the
    // read path recovers the name through the registry table
    let entries = writer.entries(None).expect("read");
    assert_eq!(entries[0].meta["user"], MetaValue::Text("u1".into()));
    assert_eq!(entries[0].meta["host"], MetaValue::Text("h1".into()));
    assert_eq!(writer.schema().meta_keys.get("user").map(|k| k.id), Some(user.id));
    assert!(writer.schema().meta_keys.get("host").is_none(), "writing must not intern");
}

#[test]
fn io_write_adapter_accepts_record_buffers() {
    let dir = tempdir().expect("tempdir");
    let mut writer = open_writer(&dir, Schema::new());

    writer
        .write_all(br#"{"level":"info","n":1}"#)
        .expect("write through io::Write");
    writer.flush().expect("flush");
    assert!(writer.write_all(b"garbage").is_err());

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].meta["n"], MetaValue::Real(1.0));
}
