//! Domain use-cases.
//!
//! # Responsibility
//! - Create, rename and delete domains.
//!
//! # Invariants
//! - Domain names are unique under exact comparison of trimmed values.
//! - A domain with linked categories cannot be deleted.

use crate::model::document::{
    trim_to_none, Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue,
    NewDocument, Relation, FIELD_DESCRIPTION, FIELD_NAME,
};
use crate::repo::document_repo::DocumentRepository;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::knowledge_base::{
    live_children, require_document, require_id, require_value, KnowledgeBase,
};

/// Input for domain creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateDomainRequest {
    pub name: String,
    pub description: Option<String>,
}

/// Input for domain update. Fields are replaced, not merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateDomainRequest {
    pub domain_id: String,
    pub name: String,
    pub description: Option<String>,
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Creates one domain and returns its id.
    pub fn create_domain(&mut self, request: &CreateDomainRequest) -> ServiceResult<DocumentId> {
        self.execute("domain_create", |scope| {
            let name = require_value(&request.name, "name")?;
            ensure_unique_name(scope.repo(), &name, None)?;

            let id = DocumentId::generate(EntityKind::Domain);
            let document = Document::new(id.clone(), EntityKind::Domain)
                .with_field(FIELD_NAME, FieldValue::Text(name))
                .with_text(FIELD_DESCRIPTION, trim_to_none(request.description.as_deref()));
            scope.create(&NewDocument::new(document))?;
            Ok(id)
        })
    }

    /// Renames a domain and replaces its description.
    pub fn update_domain(&mut self, request: &UpdateDomainRequest) -> ServiceResult<()> {
        self.execute("domain_update", |scope| {
            let id = require_id(&request.domain_id, EntityKind::Domain)?;
            require_document(scope, &id, EntityKind::Domain)?;
            let name = require_value(&request.name, "Domain name")?;
            ensure_unique_name(scope.repo(), &name, Some(&id))?;

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

    /// Deletes a domain that has no linked categories.
    pub fn delete_domain(&mut self, domain_id: &str) -> ServiceResult<()> {
        self.execute("domain_delete", |scope| {
            let id = require_id(domain_id, EntityKind::Domain)?;
            require_document(scope, &id, EntityKind::Domain)?;
            if !live_children(scope.repo(), &id, Relation::CategoryDomain)?.is_empty() {
                return Err(ServiceError::DomainHasCategories);
            }
            scope.delete(&id)?;
            Ok(())
        })
    }

    /// Lists every domain in creation order.
    pub fn list_domains(&self) -> ServiceResult<Vec<Document>> {
        let mut domains = Vec::new();
        for id in self.repo().list_ids_by_kind(EntityKind::Domain)? {
            if let Some(document) = self.repo().get_document(&id)? {
                domains.push(document);
            }
        }
        Ok(domains)
    }
}

fn ensure_unique_name<R: DocumentRepository>(
    repo: &R,
    name: &str,
    except: Option<&DocumentId>,
) -> ServiceResult<()> {
    for id in repo.list_ids_by_kind(EntityKind::Domain)? {
        if Some(&id) == except {
            continue;
        }
        let Some(domain) = repo.get_document(&id)? else {
            continue;
        };
        if domain.text_field(FIELD_NAME) == Some(name) {
            return Err(ServiceError::DuplicateDomainName);
        }
    }
    Ok(())
}
