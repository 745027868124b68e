use pocketstore_core::db::migrations::{latest_version, migration_status};
use pocketstore_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name;")
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    names
}

#[test]
fn fresh_connection_has_every_store_table() {
    let conn = open_db_in_memory().unwrap();
    let status = migration_status(&conn).unwrap();
    assert_eq!(status.current, latest_version());
    assert_eq!(status.pending(), 0);

    let tables = table_names(&conn);
    for expected in ["async_kv", "kv_cache", "object_schemas", "objects"] {
        assert!(tables.iter().any(|t| t == expected), "missing {expected}: {tables:?}");
    }
}

#[test]
fn objects_require_a_registered_type() {
    let conn = open_db_in_memory().unwrap();
    let err = conn
        .execute(
            "INSERT INTO objects (object_type, primary_key, fields) VALUES ('Ghost', 'k', '{}');",
            [],
        )
        .unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn reopening_a_file_keeps_its_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.sqlite3");

    {
        let conn = open_db(&path).unwrap();
        conn.execute(
            "INSERT INTO kv_cache (key, value) VALUES ('@MMKV', 'kept');",
            [],
        )
        .unwrap();
    }

    let conn = open_db(&path).unwrap();
    assert_eq!(migration_status(&conn).unwrap().pending(), 0);
    let value: String = conn
        .query_row("SELECT value FROM kv_cache WHERE key = '@MMKV';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(value, "kept");
}

#[test]
fn file_from_a_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    Connection::open(&path)
        .unwrap()
        .pragma_update(None, "user_version", 999)
        .unwrap();

    match open_db(&path) {
        Err(DbError::UnsupportedSchemaVersion { found, supported }) => {
            assert_eq!(found, 999);
            assert_eq!(supported, latest_version());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("newer schema must be refused"),
    }
}

#[test]
fn unopenable_path_reports_its_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-dir").join("x.sqlite3");

    match open_db(&path) {
        Err(err @ DbError::Open { .. }) => {
            assert!(err.to_string().contains("x.sqlite3"), "{err}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("parent directory does not exist"),
    }
}
