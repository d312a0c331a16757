//! Knowledge-base domain model.
//!
//! # Responsibility
//! - Define the document shape shared by domains, categories, theses and
//!   statements.
//! - Keep entity kind and relationship edges as separate typed concerns.
//!
//! # Invariants
//! - Every record is identified by a stable, unique `DocumentId`.
//! - Kind is a discriminant, never inferred from tags or labels.

pub mod document;
pub mod string_list;
