use silt::{LogWriter, MetaValue, Schema};
use tempfile::tempdir;

#[test]
fn registry_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("logs.db");

    let mut schema = Schema::new();
    schema.meta_keys.add("user");
    schema.meta_keys.add("count");
    let mut writer = LogWriter::open(&db, schema).expect("open db");
    writer.init().expect("init");
    writer
        .write_record(br#"{"level":"info","user":"u1"}"#)
        .expect("write");
    writer.close().expect("close");

    // a reopen with an empty schema rebuilds the registry from storage
    let mut writer = LogWriter::open(&db, Schema::new()).expect("reopen db");
    writer.init().expect("init");
    assert_eq!(writer.schema().meta_keys.get("user").map(|k| k.id), Some(0));
    assert_eq!(writer.schema().meta_keys.get("count").map(|k| k.id), Some(1));
    assert_eq!(writer.schema_mut().meta_keys.add("fresh").id, 2);

    // entries written under the interned id still resolve their name
    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].meta["user"], MetaValue::Text("u1".into()));
}

#[test]
fn supplied_registry_overwrites_persisted_rows() {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("logs.db");

    let mut schema = Schema::new();
    schema.meta_keys.add("alpha");
    let mut writer = LogWriter::open(&db, schema).expect("open db");
    writer.init().expect("init");
    writer.close().expect("close");

    // the freshly supplied registry wins over what was saved under id 0
    let mut schema = Schema::new();
    schema.meta_keys.add("beta");
    let mut writer = LogWriter::open(&db, schema).expect("reopen db");
    writer.init().expect("init");
    assert_eq!(writer.schema().meta_keys.get("beta").map(|k| k.id), Some(0));
    assert!(writer.schema().meta_keys.get("alpha").is_none());
}

#[test]
fn init_is_idempotent() {
    let dir = tempdir().expect("tempdir");
    let db = dir.path().join("logs.db");

    let mut writer = LogWriter::open(&db, Schema::new()).expect("open db");
    writer.init().expect("first init");
    writer
        .write_record(br#"{"level":"info","n":1}"#)
        .expect("write");
    writer.init().expect("second init");

    let entries = writer.entries(None).expect("read");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].meta["n"], MetaValue::Real(1.0));
}
