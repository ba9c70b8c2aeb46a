//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for sections and pages.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Multi-row writes (section bootstrap, duplication) run in one
//!   `BEGIN IMMEDIATE` transaction.
//! - Repository APIs return semantic errors (`PageNotFound`, `MissingOriginal`)
//!   in addition to DB transport errors.

pub mod page_repo;
mod schema;
pub mod section_repo;
