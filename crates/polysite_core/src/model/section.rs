//! Section domain model.
//!
//! A section is a locale-scoped page subtree. Its identity is the id of its
//! home page, so "is page X in section S" is a question about the tree.

use crate::model::locale::Locale;
use crate::model::page::PageId;
use serde::{Deserialize, Serialize};

/// Section read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Id of the section home page.
    pub section_id: PageId,
    /// Locale this section serves.
    pub locale: Locale,
    /// Exactly one section per store carries this flag.
    pub is_default: bool,
    /// Insertion order; ties in language lookup resolve to the lowest value.
    pub position: i64,
    /// Home page name.
    pub home_name: String,
    /// Home page handle.
    pub home_handle: String,
}

impl Section {
    /// Canonical locale key, e.g. `de_CH`.
    pub fn locale_code(&self) -> String {
        self.locale.code()
    }

    pub fn language(&self) -> &str {
        self.locale.language()
    }
}
