use campusdesk_core::db::migrations::latest_version;
use campusdesk_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "schoolYear",
        "person",
        "family",
        "familyChild",
        "familyAdult",
        "careAttendance",
        "careNap",
        "careMeal",
        "careDiaper",
        "careIncident",
        "complianceDocument",
        "photo",
        "photoTag",
        "aiSyncLog",
        "financeInvoice",
        "financePayment",
        "financeExportLog",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn foreign_keys_are_enforced() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);

    let result = conn.execute(
        "INSERT INTO photoTag (photoID, personID, photoTagTaggedBy, photoTagTimestampCreated)
         VALUES (999, 999, 999, '2025-01-01T00:00:00Z');",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("campusdesk.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    conn_first
        .execute(
            "INSERT INTO family (familyName) VALUES ('Okafor');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let families: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM family;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(families, 1);
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("var").join("campusdesk").join("db.sqlite3");

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(path.exists());
}

#[test]
fn open_db_reports_unusable_parent_directory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"plain file").unwrap();

    let error = open_db(blocker.join("db.sqlite3")).unwrap_err();
    assert!(matches!(error, DbError::CreateDir { ref path, .. } if path == &blocker));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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
