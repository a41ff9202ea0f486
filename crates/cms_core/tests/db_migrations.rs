use cms_core::db::migrations::latest_version;
use cms_core::db::{open_db, open_db_in_memory, open_db_in_memory_with, DbError};
use cms_core::{ContentSchema, EngineConfig, RepoError, SqliteContentStore, SqliteLiveStore};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::sync::Arc;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "content_items");
    assert_table_exists(&conn, "content_versions");
    assert_table_exists(&conn, "live_items");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.db");

    let first = open_db(&path).unwrap();
    assert_eq!(schema_version(&first), latest_version());
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    assert_table_exists(&second, "live_items");
}

#[test]
fn file_database_uses_wal_journal() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("wal.db")).unwrap();

    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_ascii_lowercase(), "wal");
}

#[test]
fn busy_timeout_follows_engine_config() {
    let config = EngineConfig {
        busy_timeout_ms: 1_234,
        ..EngineConfig::default()
    };
    let conn = open_db_in_memory_with(&config).unwrap();

    let timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 1_234);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn stored_versions_cannot_be_rewritten_or_deleted() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO content_items (schema_name, item_id, current_version)
         VALUES ('people', 'a', 1);
         INSERT INTO content_versions
            (schema_name, item_id, version, status, data, created_at, created_by, updated_at, updated_by)
         VALUES ('people', 'a', 1, 'visible', '{}', 1, 'u', 1, 'u');",
    )
    .unwrap();

    assert!(conn
        .execute("UPDATE content_versions SET data = '{\"x\":1}';", [])
        .is_err());
    assert!(conn.execute("DELETE FROM content_versions;", []).is_err());

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM content_versions;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn stores_reject_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let schema = Arc::new(ContentSchema::new("people", BTreeMap::new()).unwrap());

    let content_err = SqliteContentStore::try_new(&conn, Arc::clone(&schema)).err().unwrap();
    assert!(matches!(
        content_err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
    let live_err = SqliteLiveStore::try_new(&conn, schema).err().unwrap();
    assert!(matches!(live_err, RepoError::UninitializedConnection { .. }));
}

#[test]
fn stores_reject_connection_missing_live_table() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE live_items;").unwrap();
    let schema = Arc::new(ContentSchema::new("people", BTreeMap::new()).unwrap());

    assert!(SqliteContentStore::try_new(&conn, Arc::clone(&schema)).is_ok());
    let err = SqliteLiveStore::try_new(&conn, schema).err().unwrap();
    assert!(matches!(err, RepoError::MissingRequiredTable("live_items")));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
