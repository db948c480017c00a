use passvault_core::db::migrations::latest_version;
use passvault_core::db::{open_db, open_db_in_memory, DbError};
use passvault_core::{RepoError, SqlitePasswordRepository};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "principals",
        "principal_groups",
        "group_members",
        "sessions",
        "tags",
        "passwords",
        "password_tags",
        "password_secrets",
        "access_grants",
        "disclosure_audit",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("passvault.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "access_grants");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

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

#[test]
fn repositories_refuse_unmigrated_connections() {
    let conn = Connection::open_in_memory().unwrap();
    let result = SqlitePasswordRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::Db(DbError::SchemaNotReady { .. }))
    ));
}

#[test]
fn grant_rows_cannot_reveal_without_list() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO passwords (title) VALUES ('Mail');", [])
        .unwrap();
    let result = conn.execute(
        "INSERT INTO access_grants (password_id, subject_kind, subject_id, can_list, can_reveal)
         VALUES (1, 'principal', 1, 0, 1);",
        [],
    );
    assert!(result.is_err(), "reveal-only grant rows must be rejected");
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
