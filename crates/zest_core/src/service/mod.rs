//! Engine use-case services.
//!
//! # Responsibility
//! - Apply relationship-integrity rules before mutating the store.
//! - Reconcile thesis statement sets and run record-level migrations.
//! - Keep callers decoupled from storage details.
//!
//! # Invariants
//! - Every operation validates fully before its first mutation.
//! - Every operation runs inside one `DocumentRepository::atomically` unit.

pub mod category_service;
pub mod domain_service;
pub mod error;
pub mod integrity_service;
pub mod knowledge_base;
pub mod migration_service;
pub mod statement_reconciler;
pub mod thesis_service;
