//! Core domain logic for polysite multilingual page trees.
//! This crate is the single source of truth for section and relation invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LoggingError};
pub use model::locale::{Locale, LocaleParseError};
pub use model::page::{HandleError, Page, PageId, RelationId};
pub use model::section::Section;
pub use repo::page_repo::{
    Duplication, PageRepoError, PageRepoResult, PageRepository, RelationMember,
    SqlitePageRepository,
};
pub use repo::section_repo::{
    SectionRepoError, SectionRepoResult, SectionRepository, SqliteSectionRepository,
};
pub use service::page_service::{CreatePageRequest, PageService, PageServiceError};
pub use service::section_service::{AddSectionRequest, SectionService, SectionServiceError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
