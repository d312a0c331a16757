//! Read-only integrity report.
//!
//! # Responsibility
//! - Scan every record and list violations of the relationship invariants
//!   the engine maintains.
//!
//! # Invariants
//! - Never mutates the repository.
//! - Violations are reported in scan order: domains, categories, theses,
//!   statements.

use crate::model::document::{
    DocumentId, EntityKind, FieldValue, Polarity, Relation, FIELD_LEGACY_CONTENT, FIELD_NAME,
    FIELD_TEXT,
};
use crate::repo::document_repo::DocumentRepository;
use crate::service::error::ServiceResult;
use crate::service::knowledge_base::{live_parents, KnowledgeBase};
use log::info;
use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Two domains share one name.
    DuplicateDomainName {
        name: String,
        domains: Vec<DocumentId>,
    },
    CategoryWithoutDomain(DocumentId),
    ThesisWithoutCategory(DocumentId),
    /// Exactly one statement list field is present.
    UnpairedStatementFields(DocumentId),
    /// A list entry does not resolve to a statement owned by the thesis.
    DanglingStatement {
        thesis: DocumentId,
        statement: DocumentId,
    },
    /// A statement is owned by a thesis that does not list it.
    UnlistedStatement {
        thesis: DocumentId,
        statement: DocumentId,
    },
    /// A statement has no live owning thesis.
    OrphanStatement(DocumentId),
    DuplicateStatementText {
        thesis: DocumentId,
        polarity: Polarity,
        text: String,
    },
    /// Statement lists still use the text encoding.
    LegacyStatementEncoding(DocumentId),
    /// Category name still lives in the legacy content field.
    LegacyCategoryName(DocumentId),
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateDomainName { name, domains } => {
                let ids: Vec<&str> = domains.iter().map(DocumentId::as_str).collect();
                write!(f, "duplicate domain name `{name}`: {}", ids.join(", "))
            }
            Self::CategoryWithoutDomain(id) => write!(f, "category {id} has no domain"),
            Self::ThesisWithoutCategory(id) => write!(f, "thesis {id} has no category"),
            Self::UnpairedStatementFields(id) => {
                write!(f, "thesis {id} has only one statement list")
            }
            Self::DanglingStatement { thesis, statement } => write!(
                f,
                "thesis {thesis} lists {statement}, which is not one of its statements"
            ),
            Self::UnlistedStatement { thesis, statement } => {
                write!(f, "statement {statement} is not listed by its thesis {thesis}")
            }
            Self::OrphanStatement(id) => write!(f, "statement {id} has no thesis"),
            Self::DuplicateStatementText {
                thesis,
                polarity,
                text,
            } => write!(
                f,
                "thesis {thesis} has duplicate {} statement `{text}`",
                polarity.as_str()
            ),
            Self::LegacyStatementEncoding(id) => {
                write!(f, "thesis {id} stores statements as text lists")
            }
            Self::LegacyCategoryName(id) => {
                write!(f, "category {id} keeps its name in the legacy content field")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub violations: Vec<IntegrityViolation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Scans all records and reports every invariant violation.
    pub fn check_integrity(&self) -> ServiceResult<IntegrityReport> {
        let repo = self.repo();
        let mut violations = Vec::new();

        let mut by_name: Vec<(String, Vec<DocumentId>)> = Vec::new();
        for id in repo.list_ids_by_kind(EntityKind::Domain)? {
            let Some(domain) = repo.get_document(&id)? else {
                continue;
            };
            let name = domain.text_field(FIELD_NAME).unwrap_or_default().to_string();
            match by_name.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, ids)) => ids.push(id),
                None => by_name.push((name, vec![id])),
            }
        }
        for (name, domains) in by_name {
            if domains.len() > 1 {
                violations.push(IntegrityViolation::DuplicateDomainName { name, domains });
            }
        }

        for id in repo.list_ids_by_kind(EntityKind::Category)? {
            if live_parents(repo, &id, Relation::CategoryDomain)?.is_empty() {
                violations.push(IntegrityViolation::CategoryWithoutDomain(id.clone()));
            }
            let Some(category) = repo.get_document(&id)? else {
                continue;
            };
            if category.text_field(FIELD_NAME).is_none()
                && category.text_field(FIELD_LEGACY_CONTENT).is_some()
            {
                violations.push(IntegrityViolation::LegacyCategoryName(id));
            }
        }

        let mut listed_by: HashMap<DocumentId, DocumentId> = HashMap::new();
        for id in repo.list_ids_by_kind(EntityKind::Thesis)? {
            if live_parents(repo, &id, Relation::ThesisCategory)?.is_empty() {
                violations.push(IntegrityViolation::ThesisWithoutCategory(id.clone()));
            }
            let Some(thesis) = repo.get_document(&id)? else {
                continue;
            };

            let correct = thesis.field(Polarity::Correct.list_field());
            let incorrect = thesis.field(Polarity::Incorrect.list_field());
            if holds_entries(correct) != holds_entries(incorrect) {
                violations.push(IntegrityViolation::UnpairedStatementFields(id.clone()));
            }
            if [correct, incorrect]
                .into_iter()
                .flatten()
                .any(|value| matches!(value, FieldValue::Text(_)))
            {
                violations.push(IntegrityViolation::LegacyStatementEncoding(id.clone()));
                continue;
            }

            for polarity in [Polarity::Correct, Polarity::Incorrect] {
                let mut seen = HashSet::new();
                for statement_id in thesis.statement_ids(polarity) {
                    let owned = match repo.get_document(&statement_id)? {
                        Some(statement) if statement.kind == EntityKind::Statement => {
                            let owners = repo.list_parents(&statement_id, Relation::StatementThesis)?;
                            owners.contains(&id).then_some(statement)
                        }
                        _ => None,
                    };
                    let Some(statement) = owned else {
                        violations.push(IntegrityViolation::DanglingStatement {
                            thesis: id.clone(),
                            statement: statement_id,
                        });
                        continue;
                    };
                    let text = statement.text_field(FIELD_TEXT).unwrap_or_default().trim().to_string();
                    if !seen.insert(text.clone()) {
                        violations.push(IntegrityViolation::DuplicateStatementText {
                            thesis: id.clone(),
                            polarity,
                            text,
                        });
                    }
                    listed_by.insert(statement_id, id.clone());
                }
            }
        }

        for id in repo.list_ids_by_kind(EntityKind::Statement)? {
            let owners = live_parents(repo, &id, Relation::StatementThesis)?;
            match owners.first() {
                None => violations.push(IntegrityViolation::OrphanStatement(id)),
                Some(owner) if listed_by.get(&id) != Some(owner) => {
                    violations.push(IntegrityViolation::UnlistedStatement {
                        thesis: owner.clone(),
                        statement: id,
                    });
                }
                Some(_) => {}
            }
        }

        info!(
            "event=integrity_check module=service status=ok violations={}",
            violations.len()
        );
        Ok(IntegrityReport { violations })
    }
}

/// A statement field counts only when it names at least one entry.
fn holds_entries(value: Option<&FieldValue>) -> bool {
    match value {
        Some(FieldValue::Text(encoded)) => !encoded.trim().is_empty(),
        Some(FieldValue::List(items)) => !items.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::IntegrityViolation;
    use crate::model::document::{
        Document, DocumentId, EntityKind, FieldValue, NewDocument, Polarity, Relation,
        FIELD_NAME,
    };
    use crate::repo::document_repo::DocumentRepository;
    use crate::repo::memory_repo::MemoryDocumentRepository;
    use crate::service::category_service::CreateCategoryRequest;
    use crate::service::domain_service::CreateDomainRequest;
    use crate::service::knowledge_base::KnowledgeBase;
    use crate::service::statement_reconciler::StatementsInput;

    #[test]
    fn engine_built_store_is_clean() {
        let mut kb = KnowledgeBase::new(MemoryDocumentRepository::new());
        let domain = kb
            .create_domain(&CreateDomainRequest {
                name: "D".to_string(),
                description: None,
            })
            .unwrap();
        kb.create_category(&CreateCategoryRequest {
            name: "C".to_string(),
            domain_id: domain.to_string(),
            thesis_text: Some("T".to_string()),
            thesis_statements: Some(StatementsInput::texts(&["A"], &["B"])),
            ..CreateCategoryRequest::default()
        })
        .unwrap();

        assert!(kb.check_integrity().unwrap().is_clean());
    }

    #[test]
    fn reports_hand_written_violations() {
        let mut repo = MemoryDocumentRepository::new();
        for id in ["d1", "d2"] {
            repo.create_document(&NewDocument::new(
                Document::new(DocumentId::new(id), EntityKind::Domain)
                    .with_field(FIELD_NAME, FieldValue::text("Same")),
            ))
            .unwrap();
        }
        repo.create_document(&NewDocument::new(Document::new(
            DocumentId::new("c"),
            EntityKind::Category,
        )))
        .unwrap();
        repo.create_document(
            &NewDocument::new(
                Document::new(DocumentId::new("t"), EntityKind::Thesis).with_field(
                    Polarity::Correct.list_field(),
                    FieldValue::List(vec!["zest/statement/missing".to_string()]),
                ),
            )
            .linked_to(Relation::ThesisCategory, DocumentId::new("c")),
        )
        .unwrap();

        let report = KnowledgeBase::new(repo).check_integrity().unwrap();
        let violations = report.violations;
        assert!(matches!(
            &violations[0],
            IntegrityViolation::DuplicateDomainName { name, domains }
                if name == "Same" && domains.len() == 2
        ));
        assert!(violations.contains(&IntegrityViolation::CategoryWithoutDomain(
            DocumentId::new("c")
        )));
        assert!(violations.contains(&IntegrityViolation::UnpairedStatementFields(
            DocumentId::new("t")
        )));
        assert!(violations.contains(&IntegrityViolation::DanglingStatement {
            thesis: DocumentId::new("t"),
            statement: DocumentId::new("zest/statement/missing"),
        }));
    }

    #[test]
    fn empty_statement_list_counts_as_unpaired() {
        let mut repo = MemoryDocumentRepository::new();
        repo.create_document(&NewDocument::new(Document::new(
            DocumentId::new("c"),
            EntityKind::Category,
        )))
        .unwrap();
        repo.create_document(
            &NewDocument::new(
                Document::new(DocumentId::new("t"), EntityKind::Thesis)
                    .with_field(
                        Polarity::Correct.list_field(),
                        FieldValue::List(vec!["zest/statement/abc".to_string()]),
                    )
                    .with_field(Polarity::Incorrect.list_field(), FieldValue::List(Vec::new())),
            )
            .linked_to(Relation::ThesisCategory, DocumentId::new("c")),
        )
        .unwrap();

        let violations = KnowledgeBase::new(repo).check_integrity().unwrap().violations;
        assert!(violations.contains(&IntegrityViolation::UnpairedStatementFields(
            DocumentId::new("t")
        )));
    }
}
