//! Engine entry point.
//!
//! # Responsibility
//! - Own the injected document repository.
//! - Run each operation as one atomic, lock-scoped unit and log its outcome.
//!
//! # Invariants
//! - A failed operation leaves the repository exactly as it found it.
//! - Each failure is logged once with its alert message.

use crate::model::document::{trim_to_none, Document, DocumentId, EntityKind, Relation};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::write_scope::WriteScope;
use crate::service::error::{ServiceError, ServiceResult};
use log::{error, info, warn};

/// Relationship-integrity engine over one document repository.
pub struct KnowledgeBase<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Creates an engine using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn into_repo(self) -> R {
        self.repo
    }

    /// Loads one document by id, regardless of kind.
    pub fn get_document(&self, id: &DocumentId) -> ServiceResult<Option<Document>> {
        Ok(self.repo.get_document(id)?)
    }

    pub(crate) fn execute<T>(
        &mut self,
        event: &'static str,
        operation: impl FnOnce(&mut WriteScope<'_, R>) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let result: ServiceResult<(T, usize)> = self.repo.atomically(|repo| {
            let mut scope = WriteScope::new(repo);
            let output = operation(&mut scope)?;
            Ok((output, scope.mutation_count()))
        });

        match result {
            Ok((output, mutations)) => {
                info!("event={event} module=service status=ok mutations={mutations}");
                Ok(output)
            }
            Err(err) if err.is_rejection() => {
                warn!("event={event} module=service status=rejected reason=\"{err}\"");
                Err(err)
            }
            Err(err) => {
                error!("event={event} module=service status=error error=\"{err}\"");
                Err(err)
            }
        }
    }
}

/// Trims a raw identifier parameter, rejecting blank input.
pub(crate) fn require_id(raw: &str, kind: EntityKind) -> ServiceResult<DocumentId> {
    trim_to_none(Some(raw))
        .map(DocumentId::new)
        .ok_or(ServiceError::IdRequired(kind))
}

/// Trims a raw required value, rejecting blank input with `label`.
pub(crate) fn require_value(raw: &str, label: &'static str) -> ServiceResult<String> {
    trim_to_none(Some(raw)).ok_or(ServiceError::EmptyField(label))
}

/// Resolves `id` to a document of `kind`.
pub(crate) fn require_document<R: DocumentRepository>(
    scope: &WriteScope<'_, R>,
    id: &DocumentId,
    kind: EntityKind,
) -> ServiceResult<Document> {
    scope
        .get_document(id)?
        .filter(|document| document.kind == kind)
        .ok_or(ServiceError::NotFound(kind))
}

/// Parent ids of `child` through `relation` that resolve to the parent kind.
pub(crate) fn live_parents<R: DocumentRepository>(
    repo: &R,
    child: &DocumentId,
    relation: Relation,
) -> ServiceResult<Vec<DocumentId>> {
    let mut parents = Vec::new();
    for parent in repo.list_parents(child, relation)? {
        if repo.exists_as(&parent, relation.parent_kind())? {
            parents.push(parent);
        }
    }
    Ok(parents)
}

/// Child ids of `parent` through `relation` that resolve to the child kind.
pub(crate) fn live_children<R: DocumentRepository>(
    repo: &R,
    parent: &DocumentId,
    relation: Relation,
) -> ServiceResult<Vec<DocumentId>> {
    let mut children = Vec::new();
    for child in repo.list_children(parent, relation)? {
        if repo.exists_as(&child, relation.child_kind())? {
            children.push(child);
        }
    }
    Ok(children)
}
