//! Category use-cases.
//!
//! # Responsibility
//! - Create, update, attach, detach and delete categories.
//! - Cascade category deletion to theses the category owns exclusively.
//!
//! # Invariants
//! - A category keeps at least one domain link while it exists.
//! - Deleting a category detaches shared theses and destroys exclusive ones.

use crate::model::document::{
    trim_to_none, Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue,
    NewDocument, Relation, FIELD_DESCRIPTION, FIELD_NAME,
};
use crate::repo::document_repo::DocumentRepository;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::knowledge_base::{
    live_children, live_parents, require_document, require_id, require_value, KnowledgeBase,
};
use crate::service::statement_reconciler::{collect_input, plan_statements, StatementsInput};
use crate::service::thesis_service::{consume_drafts, destroy_thesis, insert_thesis};

/// Input for category creation, optionally with a first thesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub domain_id: String,
    pub description: Option<String>,
    pub thesis_text: Option<String>,
    pub thesis_note: Option<String>,
    pub thesis_statements: Option<StatementsInput>,
}

/// Input for category update. Fields are replaced, not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateCategoryRequest {
    pub category_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Creates one category linked to a domain and returns its id.
    pub fn create_category(
        &mut self,
        request: &CreateCategoryRequest,
    ) -> ServiceResult<DocumentId> {
        self.execute("category_create", |scope| {
            let name = require_value(&request.name, "category name")?;
            let domain_id = require_value(&request.domain_id, "domain id").map(DocumentId::new)?;
            let thesis_text = trim_to_none(request.thesis_text.as_deref());
            let thesis_note = trim_to_none(request.thesis_note.as_deref());
            if thesis_text.is_none()
                && (thesis_note.is_some() || request.thesis_statements.is_some())
            {
                return Err(ServiceError::EmptyField("thesis text"));
            }
            require_document(scope, &domain_id, EntityKind::Domain)?;

            let raw = collect_input(scope.repo(), request.thesis_statements.as_ref())?;
            let plan = plan_statements(&raw)?;

            let id = DocumentId::generate(EntityKind::Category);
            let document = Document::new(id.clone(), EntityKind::Category)
                .with_field(FIELD_NAME, FieldValue::Text(name))
                .with_text(FIELD_DESCRIPTION, trim_to_none(request.description.as_deref()));
            scope.create(&NewDocument::new(document).linked_to(Relation::CategoryDomain, domain_id))?;

            if let Some(text) = thesis_text {
                insert_thesis(scope, &id, text, thesis_note, &plan)?;
                consume_drafts(scope, &raw.drafts)?;
            }
            Ok(id)
        })
    }

    /// Renames a category and replaces its description.
    pub fn update_category(&mut self, request: &UpdateCategoryRequest) -> ServiceResult<()> {
        self.execute("category_update", |scope| {
            let id = require_id(&request.category_id, EntityKind::Category)?;
            require_document(scope, &id, EntityKind::Category)?;
            let name = require_value(&request.name, "Category name")?;

            let mut changes = FieldChanges::new();
            changes.insert(
                FIELD_NAME.to_string(),
                FieldChange::Set(FieldValue::Text(name)),
            );
            changes.insert(
                FIELD_DESCRIPTION.to_string(),
                FieldChange::text_or_unset(trim_to_none(request.description.as_deref())),
            );
            scope.update(&id, &changes)?;
            Ok(())
        })
    }

    /// Links a category to one more domain. Linking twice is a no-op.
    pub fn attach_category(&mut self, category_id: &str, domain_id: &str) -> ServiceResult<()> {
        self.execute("category_attach", |scope| {
            let category = require_id(category_id, EntityKind::Category)?;
            let domain = require_id(domain_id, EntityKind::Domain)?;
            require_document(scope, &category, EntityKind::Category)?;
            require_document(scope, &domain, EntityKind::Domain)?;
            scope.link(&category, Relation::CategoryDomain, &domain)?;
            Ok(())
        })
    }

    /// Removes one domain link, refusing to remove the last one.
    pub fn detach_category(&mut self, category_id: &str, domain_id: &str) -> ServiceResult<()> {
        self.execute("category_detach", |scope| {
            let category = require_id(category_id, EntityKind::Category)?;
            let domain = require_id(domain_id, EntityKind::Domain)?;
            require_document(scope, &category, EntityKind::Category)?;
            require_document(scope, &domain, EntityKind::Domain)?;

            let remaining = live_parents(scope.repo(), &category, Relation::CategoryDomain)?
                .into_iter()
                .filter(|parent| parent != &domain)
                .count();
            if remaining == 0 {
                return Err(ServiceError::LastDomainLink);
            }
            scope.unlink(&category, Relation::CategoryDomain, &domain)?;
            Ok(())
        })
    }

    /// Deletes a category.
    ///
    /// Each linked thesis is judged on its own: a thesis still linked to
    /// another category only loses this link, any other thesis is destroyed
    /// together with its statements.
    pub fn delete_category(&mut self, category_id: &str) -> ServiceResult<()> {
        self.execute("category_delete", |scope| {
            let id = require_id(category_id, EntityKind::Category)?;
            require_document(scope, &id, EntityKind::Category)?;

            for thesis_id in live_children(scope.repo(), &id, Relation::ThesisCategory)? {
                let shared = live_parents(scope.repo(), &thesis_id, Relation::ThesisCategory)?
                    .iter()
                    .any(|parent| parent != &id);
                if shared {
                    scope.unlink(&thesis_id, Relation::ThesisCategory, &id)?;
                } else if let Some(thesis) = scope.get_document(&thesis_id)? {
                    destroy_thesis(scope, &thesis)?;
                }
            }
            scope.delete(&id)?;
            Ok(())
        })
    }

    /// Categories linked to a domain, in creation order.
    pub fn list_categories(&self, domain_id: &DocumentId) -> ServiceResult<Vec<Document>> {
        let mut categories = Vec::new();
        for id in live_children(self.repo(), domain_id, Relation::CategoryDomain)? {
            if let Some(category) = self.repo().get_document(&id)? {
                categories.push(category);
            }
        }
        Ok(categories)
    }
}
