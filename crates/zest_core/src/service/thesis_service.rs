//! Thesis use-cases.
//!
//! # Responsibility
//! - Create, update, attach, detach and delete theses.
//! - Keep each thesis' statement lists and its statement documents in sync.
//!
//! # Invariants
//! - A thesis keeps at least one category link while it exists.
//! - Statement input is validated before the first write.
//! - Deleting a thesis deletes every statement it owns.

use crate::model::document::{
    trim_to_none, Document, DocumentId, EntityKind, FieldChange, FieldValue, NewDocument,
    Polarity, Relation, FIELD_NOTE, FIELD_TEXT, LABEL_SCHEDULED_FORWARD,
};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::write_scope::WriteScope;
use crate::service::error::{ServiceError, ServiceResult};
use crate::service::knowledge_base::{
    live_parents, require_document, require_id, require_value, KnowledgeBase,
};
use crate::service::statement_reconciler::{
    collect_input, diff_statements, load_owned_statements, plan_statements, OwnedStatements,
    StatementPlan, StatementsInput,
};

/// Input for thesis creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateThesisRequest {
    pub category_id: String,
    pub text: String,
    pub note: Option<String>,
    pub statements: Option<StatementsInput>,
}

/// Input for thesis update. `statements: None` removes all statements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateThesisRequest {
    pub thesis_id: String,
    pub text: String,
    pub note: Option<String>,
    pub statements: Option<StatementsInput>,
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Creates one thesis under a category and returns its id.
    pub fn create_thesis(&mut self, request: &CreateThesisRequest) -> ServiceResult<DocumentId> {
        self.execute("thesis_create", |scope| {
            let category_id = require_id(&request.category_id, EntityKind::Category)?;
            let text = require_value(&request.text, "Thesis text")?;
            require_document(scope, &category_id, EntityKind::Category)?;

            let raw = collect_input(scope.repo(), request.statements.as_ref())?;
            let plan = plan_statements(&raw)?;
            let id = insert_thesis(
                scope,
                &category_id,
                text,
                trim_to_none(request.note.as_deref()),
                &plan,
            )?;
            consume_drafts(scope, &raw.drafts)?;
            Ok(id)
        })
    }

    /// Replaces thesis text, note and statement set.
    pub fn update_thesis(&mut self, request: &UpdateThesisRequest) -> ServiceResult<()> {
        self.execute("thesis_update", |scope| {
            let id = require_id(&request.thesis_id, EntityKind::Thesis)?;
            let thesis = require_document(scope, &id, EntityKind::Thesis)?;
            let text = require_value(&request.text, "Thesis text")?;

            let raw = collect_input(scope.repo(), request.statements.as_ref())?;
            let plan = plan_statements(&raw)?;
            let owned = load_owned_statements(scope.repo(), &thesis)?;
            let change_set = diff_statements(&id, &owned, &plan);

            let mut changes = change_set.field_changes();
            changes.insert(
                FIELD_TEXT.to_string(),
                FieldChange::Set(FieldValue::Text(text)),
            );
            changes.insert(
                FIELD_NOTE.to_string(),
                FieldChange::text_or_unset(trim_to_none(request.note.as_deref())),
            );
            scope.update(&id, &changes)?;
            for statement in &change_set.create {
                scope.create(statement)?;
            }
            for statement in &change_set.delete {
                scope.delete(statement)?;
            }
            consume_drafts(scope, &raw.drafts)?;
            Ok(())
        })
    }

    /// Links a thesis to one more category. Linking twice is a no-op.
    pub fn attach_thesis(&mut self, thesis_id: &str, category_id: &str) -> ServiceResult<()> {
        self.execute("thesis_attach", |scope| {
            let thesis = require_id(thesis_id, EntityKind::Thesis)?;
            let category = require_id(category_id, EntityKind::Category)?;
            require_document(scope, &thesis, EntityKind::Thesis)?;
            require_document(scope, &category, EntityKind::Category)?;
            scope.link(&thesis, Relation::ThesisCategory, &category)?;
            Ok(())
        })
    }

    /// Removes one category link, refusing to remove the last one.
    pub fn detach_thesis(&mut self, thesis_id: &str, category_id: &str) -> ServiceResult<()> {
        self.execute("thesis_detach", |scope| {
            let thesis = require_id(thesis_id, EntityKind::Thesis)?;
            let category = require_id(category_id, EntityKind::Category)?;
            require_document(scope, &thesis, EntityKind::Thesis)?;
            require_document(scope, &category, EntityKind::Category)?;

            let categories = live_parents(scope.repo(), &thesis, Relation::ThesisCategory)?;
            if !categories.contains(&category) {
                return Err(ServiceError::ThesisNotLinked);
            }
            if categories.len() == 1 {
                return Err(ServiceError::LastCategoryLink);
            }
            scope.unlink(&thesis, Relation::ThesisCategory, &category)?;
            Ok(())
        })
    }

    /// Deletes a thesis and its statements, whatever its category links.
    pub fn delete_thesis(&mut self, thesis_id: &str) -> ServiceResult<()> {
        self.execute("thesis_delete", |scope| {
            let id = require_id(thesis_id, EntityKind::Thesis)?;
            let thesis = require_document(scope, &id, EntityKind::Thesis)?;
            destroy_thesis(scope, &thesis)
        })
    }

    /// Theses linked to a category, in creation order.
    pub fn list_theses(&self, category_id: &DocumentId) -> ServiceResult<Vec<Document>> {
        let mut theses = Vec::new();
        for id in self.repo().list_children(category_id, Relation::ThesisCategory)? {
            if let Some(thesis) = self.repo().get_document(&id)? {
                if thesis.kind == EntityKind::Thesis {
                    theses.push(thesis);
                }
            }
        }
        Ok(theses)
    }
}

/// Writes a new thesis linked to `category` followed by its planned statements.
pub(crate) fn insert_thesis<R: DocumentRepository>(
    scope: &mut WriteScope<'_, R>,
    category: &DocumentId,
    text: String,
    note: Option<String>,
    plan: &StatementPlan,
) -> ServiceResult<DocumentId> {
    let id = DocumentId::generate(EntityKind::Thesis);
    let change_set = diff_statements(&id, &OwnedStatements::default(), plan);

    let mut document = Document::new(id.clone(), EntityKind::Thesis)
        .with_field(FIELD_TEXT, FieldValue::Text(text))
        .with_text(FIELD_NOTE, note)
        .with_label(LABEL_SCHEDULED_FORWARD);
    if let Some((correct, incorrect)) = &change_set.lists {
        document = document
            .with_field(Polarity::Correct.list_field(), FieldValue::ids(correct))
            .with_field(Polarity::Incorrect.list_field(), FieldValue::ids(incorrect));
    }

    scope.create(&NewDocument::new(document).linked_to(Relation::ThesisCategory, category.clone()))?;
    for statement in &change_set.create {
        scope.create(statement)?;
    }
    Ok(id)
}

/// Deletes a thesis together with every statement it owns.
pub(crate) fn destroy_thesis<R: DocumentRepository>(
    scope: &mut WriteScope<'_, R>,
    thesis: &Document,
) -> ServiceResult<()> {
    let owned = load_owned_statements(scope.repo(), thesis)?;
    for statement in owned.all_ids() {
        scope.delete(&statement)?;
    }
    scope.delete(&thesis.id)?;
    Ok(())
}

/// Deletes draft documents read by a successful operation.
pub(crate) fn consume_drafts<R: DocumentRepository>(
    scope: &mut WriteScope<'_, R>,
    drafts: &[DocumentId],
) -> ServiceResult<()> {
    for draft in drafts {
        scope.delete(draft)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{CreateThesisRequest, UpdateThesisRequest};
    use crate::model::document::{
        Document, DocumentId, EntityKind, FieldValue, NewDocument, Polarity, FIELD_TEXT,
        LABEL_SCHEDULED_FORWARD,
    };
    use crate::repo::document_repo::DocumentRepository;
    use crate::repo::memory_repo::MemoryDocumentRepository;
    use crate::service::category_service::CreateCategoryRequest;
    use crate::service::domain_service::CreateDomainRequest;
    use crate::service::error::ServiceError;
    use crate::service::knowledge_base::KnowledgeBase;
    use crate::service::statement_reconciler::{StatementError, StatementsInput};

    fn kb_with_category() -> (KnowledgeBase<MemoryDocumentRepository>, DocumentId) {
        let mut kb = KnowledgeBase::new(MemoryDocumentRepository::new());
        let domain = kb
            .create_domain(&CreateDomainRequest {
                name: "D".to_string(),
                description: None,
            })
            .unwrap();
        let category = kb
            .create_category(&CreateCategoryRequest {
                name: "C".to_string(),
                domain_id: domain.to_string(),
                ..CreateCategoryRequest::default()
            })
            .unwrap();
        (kb, category)
    }

    fn statement_texts(
        kb: &KnowledgeBase<MemoryDocumentRepository>,
        thesis: &DocumentId,
        polarity: Polarity,
    ) -> Vec<String> {
        let thesis = kb.get_document(thesis).unwrap().unwrap();
        thesis
            .statement_ids(polarity)
            .iter()
            .map(|id| {
                let statement = kb.get_document(id).unwrap().unwrap();
                assert_eq!(statement.polarity(), Some(polarity));
                statement.text_field(FIELD_TEXT).unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn create_materializes_deduplicated_statements() {
        let (mut kb, category) = kb_with_category();
        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T2".to_string(),
                note: None,
                statements: Some(StatementsInput::texts(&["X", "X", "Y"], &["Z"])),
            })
            .unwrap();

        assert_eq!(statement_texts(&kb, &thesis, Polarity::Correct), ["X", "Y"]);
        assert_eq!(statement_texts(&kb, &thesis, Polarity::Incorrect), ["Z"]);
        let stored = kb.get_document(&thesis).unwrap().unwrap();
        assert!(stored.labels.contains(LABEL_SCHEDULED_FORWARD));
        assert_eq!(
            kb.repo().list_ids_by_kind(EntityKind::Statement).unwrap().len(),
            3
        );
    }

    #[test]
    fn one_sided_statements_leave_store_untouched() {
        let (mut kb, category) = kb_with_category();
        let before = kb.repo().len();
        let err = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                note: None,
                statements: Some(StatementsInput::Texts {
                    correct: Some(vec!["A".to_string()]),
                    incorrect: None,
                }),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Statements(StatementError::NotProvidedTogether)
        ));
        assert_eq!(kb.repo().len(), before);
    }

    #[test]
    fn update_with_same_texts_keeps_statement_documents() {
        let (mut kb, category) = kb_with_category();
        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                note: None,
                statements: Some(StatementsInput::texts(&["A"], &["B"])),
            })
            .unwrap();
        let before = kb.get_document(&thesis).unwrap().unwrap();

        kb.update_thesis(&UpdateThesisRequest {
            thesis_id: thesis.to_string(),
            text: "T renamed".to_string(),
            note: Some("n".to_string()),
            statements: Some(StatementsInput::texts(&[" A ", "A"], &["B"])),
        })
        .unwrap();

        let after = kb.get_document(&thesis).unwrap().unwrap();
        assert_eq!(
            after.statement_ids(Polarity::Correct),
            before.statement_ids(Polarity::Correct)
        );
        assert_eq!(after.text_field(FIELD_TEXT), Some("T renamed"));
    }

    #[test]
    fn update_without_statements_removes_them() {
        let (mut kb, category) = kb_with_category();
        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                note: None,
                statements: Some(StatementsInput::texts(&["A"], &["B"])),
            })
            .unwrap();
        kb.update_thesis(&UpdateThesisRequest {
            thesis_id: thesis.to_string(),
            text: "T".to_string(),
            note: None,
            statements: None,
        })
        .unwrap();

        let stored = kb.get_document(&thesis).unwrap().unwrap();
        assert!(stored.field(Polarity::Correct.list_field()).is_none());
        assert!(stored.field(Polarity::Incorrect.list_field()).is_none());
        assert!(kb
            .repo()
            .list_ids_by_kind(EntityKind::Statement)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn drafts_are_consumed_only_on_success() {
        let (kb, category) = kb_with_category();
        let mut repo = kb.into_repo();
        for (id, label, text) in [
            ("zest/draft/1", "input/correct", "A"),
            ("zest/draft/2", "input/incorrect", "B"),
        ] {
            repo.create_document(&NewDocument::new(
                Document::new(DocumentId::new(id), EntityKind::Draft)
                    .with_field(FIELD_TEXT, FieldValue::text(text))
                    .with_label(label),
            ))
            .unwrap();
        }
        let mut kb = KnowledgeBase::new(repo);

        let err = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: " ".to_string(),
                note: None,
                statements: Some(StatementsInput::drafts("input/correct", "input/incorrect")),
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "Thesis text cannot be empty");
        assert_eq!(kb.repo().list_ids_by_kind(EntityKind::Draft).unwrap().len(), 2);

        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                note: None,
                statements: Some(StatementsInput::drafts("input/correct", "input/incorrect")),
            })
            .unwrap();
        assert_eq!(statement_texts(&kb, &thesis, Polarity::Correct), ["A"]);
        assert!(kb.repo().list_ids_by_kind(EntityKind::Draft).unwrap().is_empty());
    }

    #[test]
    fn detach_refuses_last_and_unlinked_category() {
        let (mut kb, category) = kb_with_category();
        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                ..CreateThesisRequest::default()
            })
            .unwrap();

        let err = kb
            .detach_thesis(thesis.as_str(), category.as_str())
            .unwrap_err();
        assert!(matches!(err, ServiceError::LastCategoryLink));

        let domain = kb.list_domains().unwrap()[0].id.clone();
        let other = kb
            .create_category(&CreateCategoryRequest {
                name: "Other".to_string(),
                domain_id: domain.to_string(),
                ..CreateCategoryRequest::default()
            })
            .unwrap();
        let err = kb.detach_thesis(thesis.as_str(), other.as_str()).unwrap_err();
        assert!(matches!(err, ServiceError::ThesisNotLinked));

        kb.attach_thesis(thesis.as_str(), other.as_str()).unwrap();
        kb.attach_thesis(thesis.as_str(), other.as_str()).unwrap();
        kb.detach_thesis(thesis.as_str(), category.as_str()).unwrap();
        assert_eq!(kb.list_theses(&other).unwrap().len(), 1);
        assert!(kb.list_theses(&category).unwrap().is_empty());
    }

    #[test]
    fn delete_removes_owned_statements() {
        let (mut kb, category) = kb_with_category();
        let thesis = kb
            .create_thesis(&CreateThesisRequest {
                category_id: category.to_string(),
                text: "T".to_string(),
                note: None,
                statements: Some(StatementsInput::texts(&["A"], &["B"])),
            })
            .unwrap();
        kb.delete_thesis(thesis.as_str()).unwrap();
        assert!(kb.get_document(&thesis).unwrap().is_none());
        assert!(kb
            .repo()
            .list_ids_by_kind(EntityKind::Statement)
            .unwrap()
            .is_empty());
    }
}
