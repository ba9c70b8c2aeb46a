//! Domain model for multilingual page trees.
//!
//! # Responsibility
//! - Define value types shared by repositories and services.
//! - Keep locale parsing and page identity rules in one place.
//!
//! # Invariants
//! - Every page is identified by a stable `PageId`.
//! - A section is identified by the id of its home page.
//! - Alias identity is derived from the page it points at.

pub mod locale;
pub mod page;
pub mod section;
