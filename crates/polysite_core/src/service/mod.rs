//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep callers (CLI, embedding applications) decoupled from storage details.

pub mod page_service;
pub mod section_service;
