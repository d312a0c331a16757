//! Core engine for the Zest knowledge base.
//! This crate owns every relationship and lifecycle invariant of domains,
//! categories, theses and statements.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{
    Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue, NewDocument,
    Polarity, Relation,
};
pub use repo::document_repo::{
    DocumentRepository, RepoError, RepoResult, SqliteDocumentRepository,
};
pub use repo::memory_repo::MemoryDocumentRepository;
pub use service::category_service::{CreateCategoryRequest, UpdateCategoryRequest};
pub use service::domain_service::{CreateDomainRequest, UpdateDomainRequest};
pub use service::error::{ServiceError, ServiceResult};
pub use service::integrity_service::{IntegrityReport, IntegrityViolation};
pub use service::knowledge_base::KnowledgeBase;
pub use service::migration_service::{MigrationKind, MigrationReport, SkipReason};
pub use service::statement_reconciler::{StatementError, StatementsInput};
pub use service::thesis_service::{CreateThesisRequest, UpdateThesisRequest};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
