use polysite_core::db::migrations::latest_version;
use polysite_core::db::{open_db, open_db_in_memory, DbError};
use polysite_core::{
    AddSectionRequest, Locale, PageRepoError, SectionRepoError, SectionService,
    SqlitePageRepository, SqliteSectionRepository,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "pages");
    assert_table_exists(&conn, "sections");
    assert_table_exists(&conn, "page_relations");
}

#[test]
fn foreign_keys_are_enabled() {
    let conn = open_db_in_memory().unwrap();
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(enabled, 1);
}

#[test]
fn opening_same_database_twice_keeps_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("polysite.db");

    let conn_first = open_db(&path).unwrap();
    let service = SectionService::new(SqliteSectionRepository::try_new(&conn_first).unwrap());
    service
        .add_section(AddSectionRequest::new(
            Locale::parse("en_US").unwrap(),
            "Home",
            "home",
        ))
        .unwrap();
    drop(service);
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let service = SectionService::new(SqliteSectionRepository::try_new(&conn_second).unwrap());
    let default = service.default_section().unwrap();
    assert_eq!(default.locale_code(), "en_US");
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
fn repositories_reject_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let section_err = SqliteSectionRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        section_err,
        SectionRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));

    let page_err = SqlitePageRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        page_err,
        PageRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
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
