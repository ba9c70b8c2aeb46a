//! Shared schema readiness checks and tree queries used by repositories.

use crate::db::migrations::latest_version;
use crate::model::page::MAX_HANDLE_CHARS;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

/// Reason a connection cannot back a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchemaIssue {
    Version {
        expected: u32,
        actual: u32,
    },
    MissingTable(&'static str),
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Checks schema version plus required tables/columns.
pub(crate) fn check_schema(
    conn: &Connection,
    required: &[(&'static str, &[&'static str])],
) -> rusqlite::Result<Option<SchemaIssue>> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Ok(Some(SchemaIssue::Version { expected, actual }));
    }

    for &(table, columns) in required {
        if !table_exists(conn, table)? {
            return Ok(Some(SchemaIssue::MissingTable(table)));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Ok(Some(SchemaIssue::MissingColumn { table, column }));
            }
        }
    }

    Ok(None)
}

/// Finds the home page id of the section containing `page_uuid`.
///
/// Walks the parent chain; the nearest ancestor (or self) registered in
/// `sections` wins.
pub(crate) fn section_uuid_for_page(
    conn: &Connection,
    page_uuid: Uuid,
) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "WITH RECURSIVE ancestry(page_uuid, parent_uuid, depth) AS (
            SELECT page_uuid, parent_uuid, 0
            FROM pages
            WHERE page_uuid = ?1
            UNION ALL
            SELECT p.page_uuid, p.parent_uuid, a.depth + 1
            FROM pages p
            INNER JOIN ancestry a ON p.page_uuid = a.parent_uuid
            WHERE a.depth < 4096
        )
        SELECT s.section_uuid
        FROM ancestry a
        INNER JOIN sections s ON s.section_uuid = a.page_uuid
        ORDER BY a.depth ASC
        LIMIT 1;",
        [page_uuid.to_string()],
        |row| row.get(0),
    )
    .optional()
}

/// Returns `base`, or `base-2`, `base-3`, ... whichever is free under `parent`.
///
/// Suffixed candidates cut `base` so the result stays within `MAX_HANDLE_CHARS`.
pub(crate) fn unique_sibling_handle(
    conn: &Connection,
    parent_uuid: Option<Uuid>,
    base: &str,
) -> rusqlite::Result<String> {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while sibling_handle_taken(conn, parent_uuid, &candidate)? {
        candidate = suffixed_handle(base, suffix);
        suffix += 1;
    }
    Ok(candidate)
}

fn suffixed_handle(base: &str, suffix: u32) -> String {
    let tail = format!("-{suffix}");
    let stem: String = base
        .chars()
        .take(MAX_HANDLE_CHARS.saturating_sub(tail.len()))
        .collect();
    format!("{}{tail}", stem.trim_end_matches('-'))
}

pub(crate) fn sibling_handle_taken(
    conn: &Connection,
    parent_uuid: Option<Uuid>,
    handle: &str,
) -> rusqlite::Result<bool> {
    let taken: i64 = match parent_uuid {
        Some(parent_uuid) => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM pages WHERE parent_uuid = ?1 AND handle = ?2
            );",
            [parent_uuid.to_string(), handle.to_string()],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM pages WHERE parent_uuid IS NULL AND handle = ?1
            );",
            [handle],
            |row| row.get(0),
        )?,
    };
    Ok(taken == 1)
}

pub(crate) fn next_display_order(
    conn: &Connection,
    parent_uuid: Option<Uuid>,
) -> rusqlite::Result<i64> {
    match parent_uuid {
        Some(parent_uuid) => conn.query_row(
            "SELECT COALESCE(MAX(display_order), -1) + 1
             FROM pages
             WHERE parent_uuid = ?1;",
            [parent_uuid.to_string()],
            |row| row.get(0),
        ),
        None => conn.query_row(
            "SELECT COALESCE(MAX(display_order), -1) + 1
             FROM pages
             WHERE parent_uuid IS NULL;",
            [],
            |row| row.get(0),
        ),
    }
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid `{value}` in {column}"))
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
