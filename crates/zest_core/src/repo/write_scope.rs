//! Per-operation mutation guard.
//!
//! One engine call mutates each record at most once. `WriteScope` records
//! every document it writes and refuses a second structural mutation of the
//! same record with `RepoError::AlreadyLocked`. Reads pass through.

use crate::model::document::{Document, DocumentId, FieldChanges, NewDocument, Relation};
use crate::repo::document_repo::{DocumentRepository, RepoError, RepoResult};
use std::collections::HashSet;

pub struct WriteScope<'r, R: DocumentRepository> {
    repo: &'r mut R,
    locked: HashSet<DocumentId>,
}

impl<'r, R: DocumentRepository> WriteScope<'r, R> {
    pub fn new(repo: &'r mut R) -> Self {
        Self {
            repo,
            locked: HashSet::new(),
        }
    }

    /// Read access to the wrapped repository.
    pub fn repo(&self) -> &R {
        self.repo
    }

    pub fn get_document(&self, id: &DocumentId) -> RepoResult<Option<Document>> {
        self.repo.get_document(id)
    }

    fn lock(&mut self, id: &DocumentId) -> RepoResult<()> {
        if !self.locked.insert(id.clone()) {
            return Err(RepoError::AlreadyLocked(id.clone()));
        }
        Ok(())
    }

    pub fn create(&mut self, new: &NewDocument) -> RepoResult<()> {
        self.lock(&new.document.id)?;
        self.repo.create_document(new)
    }

    pub fn update(&mut self, id: &DocumentId, changes: &FieldChanges) -> RepoResult<()> {
        self.lock(id)?;
        self.repo.update_fields(id, changes)
    }

    /// Links `child` to `parent`; the child is the mutated record.
    pub fn link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        self.lock(child)?;
        self.repo.add_link(child, relation, parent)
    }

    /// Unlinks `child` from `parent`; the child is the mutated record.
    pub fn unlink(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        self.lock(child)?;
        self.repo.remove_link(child, relation, parent)
    }

    pub fn delete(&mut self, id: &DocumentId) -> RepoResult<()> {
        self.lock(id)?;
        self.repo.delete_document(id)
    }

    /// Number of records mutated so far.
    pub fn mutation_count(&self) -> usize {
        self.locked.len()
    }
}

#[cfg(test)]
mod tests {
    use super::WriteScope;
    use crate::model::document::{
        Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue, NewDocument,
        FIELD_NAME,
    };
    use crate::repo::document_repo::RepoError;
    use crate::repo::memory_repo::MemoryDocumentRepository;

    #[test]
    fn second_mutation_of_same_record_is_refused() {
        let mut repo = MemoryDocumentRepository::new();
        let mut scope = WriteScope::new(&mut repo);
        let id = DocumentId::new("d");
        scope
            .create(&NewDocument::new(Document::new(id.clone(), EntityKind::Domain)))
            .unwrap();

        let mut changes = FieldChanges::new();
        changes.insert(
            FIELD_NAME.to_string(),
            FieldChange::Set(FieldValue::text("late rename")),
        );
        let err = scope.update(&id, &changes).unwrap_err();
        assert!(matches!(err, RepoError::AlreadyLocked(locked) if locked == id));
        assert_eq!(scope.mutation_count(), 1);
    }
}
