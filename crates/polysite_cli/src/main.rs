//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `polysite_core` linkage.
//! - Print the registered locale sections of a store for quick sanity checks.
//!
//! Environment:
//! - `POLYSITE_DB`: database file; in-memory when unset.
//! - `POLYSITE_LOG_DIR`: absolute log directory; logging stays off when unset.
//! - `POLYSITE_LOG_LEVEL`: log level; build-mode default when unset.

use polysite_core::db::{open_db, open_db_in_memory};
use polysite_core::{init_logging, LogConfig, SectionService, SqliteSectionRepository};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("POLYSITE_LOG_DIR") {
        let config = match std::env::var("POLYSITE_LOG_LEVEL") {
            Ok(level) => LogConfig::new(&level, &log_dir)?,
            Err(_) => LogConfig::with_default_level(&log_dir)?,
        };
        init_logging(&config)?;
    }

    println!("polysite_core ping={}", polysite_core::ping());
    println!("polysite_core version={}", polysite_core::core_version());

    let conn = match std::env::var("POLYSITE_DB") {
        Ok(path) => open_db(path)?,
        Err(_) => open_db_in_memory()?,
    };
    let sections = SectionService::new(SqliteSectionRepository::try_new(&conn)?);

    let listed = sections.list_sections()?;
    println!(
        "sections={} multilingual={}",
        listed.len(),
        sections.is_multilingual_enabled()?
    );
    for section in listed {
        println!(
            "section locale={} default={} home={} id={}",
            section.locale, section.is_default, section.home_handle, section.section_id
        );
    }
    Ok(())
}
