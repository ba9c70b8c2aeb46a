//! Ordered schema steps for the page/section store.
//!
//! - v1 `0001_pages.sql`: page tree with alias pointers.
//! - v2 `0002_multilingual.sql`: locale sections and cross-section relations.
//!
//! Pending steps run in one transaction; the last applied step is mirrored
//! to `PRAGMA user_version`, which repositories check in `try_new`.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_pages.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_multilingual.sql"),
    },
];

/// Schema version repositories expect.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings a store up to `latest_version()`.
///
/// A store newer than this binary is refused rather than downgraded.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        current_version,
        latest,
        MIGRATIONS
            .iter()
            .filter(|migration| migration.version > current_version)
            .count()
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
