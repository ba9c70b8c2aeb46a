//! Page domain model.
//!
//! # Responsibility
//! - Define the page read model shared by repositories and services.
//! - Provide handle (URL slug) derivation and validation.
//!
//! # Invariants
//! - `page_id` is stable and never reused for another page.
//! - An alias (`pointer_id = Some`) never points at itself or at another alias.
//! - `collection_id()` of an alias is the id of the page it points at.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable page identifier.
pub type PageId = Uuid;

/// Opaque identifier grouping equivalent pages across sections.
pub type RelationId = Uuid;

pub(crate) const MAX_HANDLE_CHARS: usize = 128;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("valid handle regex"));
static NON_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug separator regex"));

/// Page read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Row identity of this node in the tree.
    pub page_id: PageId,
    /// Parent node. `None` only for section home pages.
    pub parent_id: Option<PageId>,
    /// Original page shown by this alias.
    pub pointer_id: Option<PageId>,
    /// User-facing page name.
    pub name: String,
    /// URL segment, unique among siblings.
    pub handle: String,
    /// Page template handle, e.g. `full`.
    pub template: Option<String>,
    /// Stable child order key within one parent.
    pub display_order: i64,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Page {
    /// Effective identity: the original's id for aliases, own id otherwise.
    pub fn collection_id(&self) -> PageId {
        self.pointer_id.unwrap_or(self.page_id)
    }

    /// Whether this node is an alias of another page.
    pub fn is_alias(&self) -> bool {
        self.pointer_id.is_some()
    }

    /// Whether this node is the home page of a section.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Rejected page handle input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Handle (or the name it was derived from) is empty.
    Empty,
    /// Handle has characters outside `[a-z0-9_-]` or a bad leading char.
    Invalid(String),
    /// Handle exceeds the maximum length.
    TooLong(usize),
}

impl Display for HandleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "page handle must not be empty"),
            Self::Invalid(value) => write!(f, "invalid page handle `{value}`"),
            Self::TooLong(len) => {
                write!(f, "page handle has {len} chars; max is {MAX_HANDLE_CHARS}")
            }
        }
    }
}

impl Error for HandleError {}

/// Validates an explicit page handle.
pub fn validate_handle(value: &str) -> Result<(), HandleError> {
    if value.is_empty() {
        return Err(HandleError::Empty);
    }
    let len = value.chars().count();
    if len > MAX_HANDLE_CHARS {
        return Err(HandleError::TooLong(len));
    }
    if !HANDLE_RE.is_match(value) {
        return Err(HandleError::Invalid(value.to_string()));
    }
    Ok(())
}

/// Derives a handle from a page name: `"Old Page"` -> `"old-page"`.
///
/// Non-ASCII characters are dropped, runs of separators collapse to `-`.
pub fn handle_from_name(name: &str) -> Result<String, HandleError> {
    let lowered = name.trim().to_ascii_lowercase();
    let slug = NON_SLUG_RE.replace_all(&lowered, "-");
    let slug: String = slug
        .trim_matches('-')
        .chars()
        .take(MAX_HANDLE_CHARS)
        .collect();
    let slug = slug.trim_end_matches('-').to_string();
    validate_handle(&slug)?;
    Ok(slug)
}

/// Returns a fresh v4 relation id.
pub fn new_relation_id() -> RelationId {
    Uuid::new_v4()
}
