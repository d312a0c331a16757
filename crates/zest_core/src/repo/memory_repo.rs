//! In-memory document repository.
//!
//! # Responsibility
//! - Mirror `SqliteDocumentRepository` semantics without a database, so the
//!   engine can be exercised against a plain value.
//!
//! # Invariants
//! - Listing order is insertion order, as in the SQLite implementation.
//! - A failed `atomically` closure restores the exact prior state.
//!
//! `atomically` snapshots the whole store before running the closure, so
//! every engine operation costs O(stored documents) here. Use it for tests
//! and small stores; `SqliteDocumentRepository` keeps operations bounded by
//! the records they touch.

use crate::model::document::{Document, DocumentId, EntityKind, FieldChanges, NewDocument, Relation};
use crate::repo::document_repo::{DocumentRepository, RepoError, RepoResult};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredDocument {
    seq: u64,
    document: Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredLink {
    child: DocumentId,
    relation: Relation,
    parent: DocumentId,
}

/// Document repository backed by in-process collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocumentRepository {
    documents: BTreeMap<DocumentId, StoredDocument>,
    links: Vec<StoredLink>,
    next_seq: u64,
}

impl MemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents of every kind.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn ids_in_order<'a>(&self, docs: impl Iterator<Item = &'a StoredDocument>) -> Vec<DocumentId> {
        let mut matched: Vec<&StoredDocument> = docs.collect();
        matched.sort_by_key(|stored| stored.seq);
        matched
            .into_iter()
            .map(|stored| stored.document.id.clone())
            .collect()
    }

    fn require(&self, id: &DocumentId) -> RepoResult<()> {
        if self.documents.contains_key(id) {
            Ok(())
        } else {
            Err(RepoError::NotFound(id.clone()))
        }
    }
}

impl DocumentRepository for MemoryDocumentRepository {
    fn get_document(&self, id: &DocumentId) -> RepoResult<Option<Document>> {
        Ok(self.documents.get(id).map(|stored| stored.document.clone()))
    }

    fn list_ids_by_kind(&self, kind: EntityKind) -> RepoResult<Vec<DocumentId>> {
        Ok(self.ids_in_order(
            self.documents
                .values()
                .filter(|stored| stored.document.kind == kind),
        ))
    }

    fn list_ids_with_label(&self, label: &str) -> RepoResult<Vec<DocumentId>> {
        Ok(self.ids_in_order(
            self.documents
                .values()
                .filter(|stored| stored.document.labels.contains(label)),
        ))
    }

    fn list_children(
        &self,
        parent: &DocumentId,
        relation: Relation,
    ) -> RepoResult<Vec<DocumentId>> {
        Ok(self
            .links
            .iter()
            .filter(|link| link.relation == relation && &link.parent == parent)
            .map(|link| link.child.clone())
            .collect())
    }

    fn list_parents(&self, child: &DocumentId, relation: Relation) -> RepoResult<Vec<DocumentId>> {
        Ok(self
            .links
            .iter()
            .filter(|link| link.relation == relation && &link.child == child)
            .map(|link| link.parent.clone())
            .collect())
    }

    fn create_document(&mut self, new: &NewDocument) -> RepoResult<()> {
        let id = &new.document.id;
        if self.documents.contains_key(id) {
            return Err(RepoError::AlreadyExists(id.clone()));
        }
        for link in &new.links {
            self.require(&link.parent)?;
        }

        self.next_seq += 1;
        self.documents.insert(
            id.clone(),
            StoredDocument {
                seq: self.next_seq,
                document: new.document.clone(),
            },
        );
        for link in &new.links {
            let stored = StoredLink {
                child: id.clone(),
                relation: link.relation,
                parent: link.parent.clone(),
            };
            if !self.links.contains(&stored) {
                self.links.push(stored);
            }
        }
        Ok(())
    }

    fn update_fields(&mut self, id: &DocumentId, changes: &FieldChanges) -> RepoResult<()> {
        let stored = self
            .documents
            .get_mut(id)
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        stored.document.apply_changes(changes);
        Ok(())
    }

    fn add_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        self.require(child)?;
        self.require(parent)?;
        let stored = StoredLink {
            child: child.clone(),
            relation,
            parent: parent.clone(),
        };
        if self.links.contains(&stored) {
            return Ok(false);
        }
        self.links.push(stored);
        Ok(true)
    }

    fn remove_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        let before = self.links.len();
        self.links.retain(|link| {
            !(link.relation == relation && &link.child == child && &link.parent == parent)
        });
        Ok(self.links.len() != before)
    }

    fn delete_document(&mut self, id: &DocumentId) -> RepoResult<()> {
        if self.documents.remove(id).is_none() {
            return Err(RepoError::NotFound(id.clone()));
        }
        self.links
            .retain(|link| &link.child != id && &link.parent != id);
        Ok(())
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }
}
