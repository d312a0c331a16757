//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the document-store contract the engine is written against.
//! - Isolate SQLite query details from service orchestration.
//! - Provide an in-memory implementation with identical semantics.
//!
//! # Invariants
//! - Repositories enforce referential existence (links point at stored
//!   documents) but not multiplicity rules; those belong to services.
//! - Every list operation returns ids in insertion order.

pub mod document_repo;
pub mod memory_repo;
pub mod write_scope;
