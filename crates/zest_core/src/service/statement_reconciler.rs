//! Thesis statement reconciliation.
//!
//! # Responsibility
//! - Turn raw correct/incorrect statement inputs into a validated,
//!   deduplicated target set.
//! - Compute the statement documents to create and delete so a thesis reaches
//!   that target set.
//!
//! # Invariants
//! - Validation never touches the store; a rejected input changes nothing.
//! - A planned statement set is either empty on both sides or non-empty on
//!   both sides.
//! - Texts are unique per (thesis, polarity) after trimming; first occurrence
//!   order is kept.

use crate::model::document::{
    Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue, NewDocument,
    Polarity, Relation, FIELD_POLARITY, FIELD_TEXT,
};
use crate::repo::document_repo::{DocumentRepository, RepoResult};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Statement input validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementError {
    /// Exactly one side has usable statements.
    NotProvidedTogether,
    /// One side was supplied as an explicitly empty list.
    EmptyArrays,
}

impl Display for StatementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotProvidedTogether => write!(
                f,
                "Both thesis correct statements and incorrect statements must be provided together"
            ),
            Self::EmptyArrays => write!(
                f,
                "Both thesis correct statements and incorrect statements must be non-empty arrays"
            ),
        }
    }
}

impl Error for StatementError {}

/// Caller-supplied statement input for thesis create/update operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementsInput {
    /// Literal text lists. `None` means the side was not supplied at all.
    Texts {
        correct: Option<Vec<String>>,
        incorrect: Option<Vec<String>>,
    },
    /// Draft documents grouped by label, read in insertion order and deleted
    /// once the operation succeeds.
    Drafts {
        correct_label: String,
        incorrect_label: String,
    },
}

impl StatementsInput {
    /// Literal input with both sides supplied.
    pub fn texts<S: AsRef<str>>(correct: &[S], incorrect: &[S]) -> Self {
        Self::Texts {
            correct: Some(correct.iter().map(|s| s.as_ref().to_string()).collect()),
            incorrect: Some(incorrect.iter().map(|s| s.as_ref().to_string()).collect()),
        }
    }

    pub fn drafts(correct_label: impl Into<String>, incorrect_label: impl Into<String>) -> Self {
        Self::Drafts {
            correct_label: correct_label.into(),
            incorrect_label: incorrect_label.into(),
        }
    }
}

/// Statement input resolved to plain texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawStatements {
    pub correct: Option<Vec<String>>,
    pub incorrect: Option<Vec<String>>,
    /// Draft documents consumed by this input.
    pub drafts: Vec<DocumentId>,
}

/// Reads statement input. An absent input resolves to two unsupplied sides.
pub fn collect_input<R: DocumentRepository>(
    repo: &R,
    input: Option<&StatementsInput>,
) -> RepoResult<RawStatements> {
    match input {
        None => Ok(RawStatements::default()),
        Some(StatementsInput::Texts { correct, incorrect }) => Ok(RawStatements {
            correct: correct.clone(),
            incorrect: incorrect.clone(),
            drafts: Vec::new(),
        }),
        Some(StatementsInput::Drafts {
            correct_label,
            incorrect_label,
        }) => {
            let mut drafts = Vec::new();
            let correct = read_drafts(repo, correct_label, &mut drafts)?;
            let incorrect = read_drafts(repo, incorrect_label, &mut drafts)?;
            Ok(RawStatements {
                correct,
                incorrect,
                drafts,
            })
        }
    }
}

fn read_drafts<R: DocumentRepository>(
    repo: &R,
    label: &str,
    consumed: &mut Vec<DocumentId>,
) -> RepoResult<Option<Vec<String>>> {
    let mut texts = Vec::new();
    for id in repo.list_ids_with_label(label)? {
        let Some(draft) = repo.get_document(&id)? else {
            continue;
        };
        if draft.kind != EntityKind::Draft {
            continue;
        }
        texts.push(draft.text_field(FIELD_TEXT).unwrap_or_default().to_string());
        if !consumed.contains(&id) {
            consumed.push(id);
        }
    }
    Ok((!texts.is_empty()).then_some(texts))
}

/// Validated target statement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementPlan {
    /// Both statement fields become absent.
    Remove,
    /// Both statement fields hold these texts, in order.
    Create {
        correct: Vec<String>,
        incorrect: Vec<String>,
    },
}

impl StatementPlan {
    pub fn texts(&self, polarity: Polarity) -> &[String] {
        match self {
            Self::Remove => &[],
            Self::Create { correct, .. } if polarity == Polarity::Correct => correct.as_slice(),
            Self::Create { incorrect, .. } => incorrect.as_slice(),
        }
    }
}

/// Validates raw input: trim, drop blanks, require pairing, dedup.
pub fn plan_statements(raw: &RawStatements) -> Result<StatementPlan, StatementError> {
    let correct = clean_texts(raw.correct.as_deref());
    let incorrect = clean_texts(raw.incorrect.as_deref());

    match (correct.is_empty(), incorrect.is_empty()) {
        (true, true) => Ok(StatementPlan::Remove),
        (false, false) => Ok(StatementPlan::Create {
            correct: dedup_texts(correct),
            incorrect: dedup_texts(incorrect),
        }),
        _ if is_explicitly_empty(&raw.correct) || is_explicitly_empty(&raw.incorrect) => {
            Err(StatementError::EmptyArrays)
        }
        _ => Err(StatementError::NotProvidedTogether),
    }
}

fn clean_texts(raw: Option<&[String]>) -> Vec<String> {
    raw.unwrap_or_default()
        .iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn dedup_texts(texts: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|text| seen.insert(text.clone()))
        .collect()
}

fn is_explicitly_empty(side: &Option<Vec<String>>) -> bool {
    side.as_ref().is_some_and(Vec::is_empty)
}

/// Statements currently owned by one thesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedStatements {
    pub correct: Vec<(DocumentId, String)>,
    pub incorrect: Vec<(DocumentId, String)>,
    /// Statements linked to the thesis but missing from its lists.
    pub stray: Vec<DocumentId>,
}

impl OwnedStatements {
    fn side(&self, polarity: Polarity) -> &[(DocumentId, String)] {
        match polarity {
            Polarity::Correct => &self.correct,
            Polarity::Incorrect => &self.incorrect,
        }
    }

    fn ids(&self, polarity: Polarity) -> Vec<DocumentId> {
        self.side(polarity).iter().map(|(id, _)| id.clone()).collect()
    }

    fn texts_match(&self, plan: &StatementPlan) -> bool {
        [Polarity::Correct, Polarity::Incorrect].into_iter().all(|polarity| {
            self.side(polarity)
                .iter()
                .map(|(_, text)| text.as_str())
                .eq(plan.texts(polarity).iter().map(String::as_str))
        })
    }

    /// Every owned statement id: listed ones first, then stray ones.
    pub fn all_ids(&self) -> Vec<DocumentId> {
        let mut ids = self.ids(Polarity::Correct);
        ids.extend(self.ids(Polarity::Incorrect));
        ids.extend(self.stray.iter().cloned());
        ids
    }
}

/// Loads the statements a thesis owns, from its list fields and its
/// statement links. Dangling list entries are ignored.
pub fn load_owned_statements<R: DocumentRepository>(
    repo: &R,
    thesis: &Document,
) -> RepoResult<OwnedStatements> {
    let mut owned = OwnedStatements::default();
    let mut listed = HashSet::new();

    for polarity in [Polarity::Correct, Polarity::Incorrect] {
        for id in thesis.statement_ids(polarity) {
            let Some(statement) = repo.get_document(&id)? else {
                continue;
            };
            if statement.kind != EntityKind::Statement || !listed.insert(id.clone()) {
                continue;
            }
            let text = statement.text_field(FIELD_TEXT).unwrap_or_default().to_string();
            match polarity {
                Polarity::Correct => owned.correct.push((id, text)),
                Polarity::Incorrect => owned.incorrect.push((id, text)),
            }
        }
    }

    for id in repo.list_children(&thesis.id, Relation::StatementThesis)? {
        if !listed.contains(&id) && repo.exists_as(&id, EntityKind::Statement)? {
            owned.stray.push(id);
        }
    }

    Ok(owned)
}

/// Builds one statement document owned by `thesis`.
pub fn new_statement(thesis: &DocumentId, polarity: Polarity, text: &str) -> NewDocument {
    let document = Document::new(DocumentId::generate(EntityKind::Statement), EntityKind::Statement)
        .with_field(FIELD_TEXT, FieldValue::text(text))
        .with_field(FIELD_POLARITY, FieldValue::text(polarity.as_str()));
    NewDocument::new(document).linked_to(Relation::StatementThesis, thesis.clone())
}

/// Document-level operations that move a thesis to a planned statement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementChangeSet {
    pub create: Vec<NewDocument>,
    pub delete: Vec<DocumentId>,
    /// Target list values; `None` when both fields become absent.
    pub lists: Option<(Vec<DocumentId>, Vec<DocumentId>)>,
}

impl StatementChangeSet {
    /// Whether no statement document is created or deleted.
    pub fn is_noop(&self) -> bool {
        self.create.is_empty() && self.delete.is_empty()
    }

    /// Thesis field changes writing the target lists.
    pub fn field_changes(&self) -> FieldChanges {
        let mut changes = FieldChanges::new();
        for polarity in [Polarity::Correct, Polarity::Incorrect] {
            let change = match &self.lists {
                Some((correct, incorrect)) => {
                    let ids = match polarity {
                        Polarity::Correct => correct,
                        Polarity::Incorrect => incorrect,
                    };
                    FieldChange::Set(FieldValue::ids(ids))
                }
                None => FieldChange::Unset,
            };
            changes.insert(polarity.list_field().to_string(), change);
        }
        changes
    }
}

/// Diffs the owned statements of `thesis` against `plan`.
///
/// When the planned texts equal the current texts in order, existing
/// documents are kept. Otherwise every owned statement is replaced.
pub fn diff_statements(
    thesis: &DocumentId,
    owned: &OwnedStatements,
    plan: &StatementPlan,
) -> StatementChangeSet {
    if let StatementPlan::Create { .. } = plan {
        if owned.texts_match(plan) {
            return StatementChangeSet {
                create: Vec::new(),
                delete: owned.stray.clone(),
                lists: Some((owned.ids(Polarity::Correct), owned.ids(Polarity::Incorrect))),
            };
        }
    }

    let delete = owned.all_ids();
    match plan {
        StatementPlan::Remove => StatementChangeSet {
            create: Vec::new(),
            delete,
            lists: None,
        },
        StatementPlan::Create { correct, incorrect } => {
            let correct_docs: Vec<NewDocument> = correct
                .iter()
                .map(|text| new_statement(thesis, Polarity::Correct, text))
                .collect();
            let incorrect_docs: Vec<NewDocument> = incorrect
                .iter()
                .map(|text| new_statement(thesis, Polarity::Incorrect, text))
                .collect();
            let lists = Some((
                correct_docs.iter().map(|new| new.document.id.clone()).collect(),
                incorrect_docs.iter().map(|new| new.document.id.clone()).collect(),
            ));
            let mut create = correct_docs;
            create.extend(incorrect_docs);
            StatementChangeSet {
                create,
                delete,
                lists,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(correct: &[&str], incorrect: &[&str]) -> RawStatements {
        RawStatements {
            correct: Some(correct.iter().map(|s| s.to_string()).collect()),
            incorrect: Some(incorrect.iter().map(|s| s.to_string()).collect()),
            drafts: Vec::new(),
        }
    }

    #[test]
    fn plan_dedups_each_side_preserving_first_occurrence() {
        let plan = plan_statements(&raw(&["A", "A", "B"], &["C", "C"])).unwrap();
        assert_eq!(
            plan,
            StatementPlan::Create {
                correct: vec!["A".to_string(), "B".to_string()],
                incorrect: vec!["C".to_string()],
            }
        );
    }

    #[test]
    fn plan_trims_and_drops_blank_entries() {
        let plan = plan_statements(&raw(&[" Valid ", "", "   "], &["\n", "Other"])).unwrap();
        assert_eq!(plan.texts(Polarity::Correct), ["Valid".to_string()]);
        assert_eq!(plan.texts(Polarity::Incorrect), ["Other".to_string()]);
    }

    #[test]
    fn all_blank_input_plans_removal() {
        assert_eq!(
            plan_statements(&raw(&["", "  "], &["\n\n"])).unwrap(),
            StatementPlan::Remove
        );
        assert_eq!(
            plan_statements(&RawStatements::default()).unwrap(),
            StatementPlan::Remove
        );
    }

    #[test]
    fn one_sided_input_is_rejected() {
        let only_correct = RawStatements {
            correct: Some(vec!["A".to_string()]),
            ..RawStatements::default()
        };
        assert_eq!(
            plan_statements(&only_correct),
            Err(StatementError::NotProvidedTogether)
        );
        assert_eq!(
            plan_statements(&raw(&["A"], &["  "])),
            Err(StatementError::NotProvidedTogether)
        );
    }

    #[test]
    fn explicitly_empty_side_uses_empty_array_message() {
        let err = plan_statements(&raw(&[], &["B"])).unwrap_err();
        assert_eq!(err, StatementError::EmptyArrays);
        assert!(err.to_string().contains("must be non-empty arrays"));
    }

    #[test]
    fn diff_keeps_documents_when_texts_are_unchanged() {
        let thesis = DocumentId::new("zest/thesis/t");
        let owned = OwnedStatements {
            correct: vec![(DocumentId::new("s1"), "A".to_string())],
            incorrect: vec![(DocumentId::new("s2"), "B".to_string())],
            stray: vec![DocumentId::new("s3")],
        };
        let plan = plan_statements(&raw(&["A"], &["B"])).unwrap();
        let changes = diff_statements(&thesis, &owned, &plan);
        assert!(changes.create.is_empty());
        assert_eq!(changes.delete, vec![DocumentId::new("s3")]);
        assert_eq!(
            changes.lists,
            Some((vec![DocumentId::new("s1")], vec![DocumentId::new("s2")]))
        );
    }

    #[test]
    fn diff_replaces_everything_when_texts_change() {
        let thesis = DocumentId::new("zest/thesis/t");
        let owned = OwnedStatements {
            correct: vec![(DocumentId::new("s1"), "A".to_string())],
            incorrect: vec![(DocumentId::new("s2"), "B".to_string())],
            stray: Vec::new(),
        };
        let plan = plan_statements(&raw(&["A", "X"], &["B"])).unwrap();
        let changes = diff_statements(&thesis, &owned, &plan);
        assert_eq!(changes.delete, vec![DocumentId::new("s1"), DocumentId::new("s2")]);
        assert_eq!(changes.create.len(), 3);
        assert!(changes
            .create
            .iter()
            .all(|new| new.links[0].parent == thesis));
        let (correct, incorrect) = changes.lists.clone().unwrap();
        assert_eq!((correct.len(), incorrect.len()), (2, 1));
    }

    #[test]
    fn removal_unsets_both_list_fields() {
        let thesis = DocumentId::new("zest/thesis/t");
        let changes = diff_statements(&thesis, &OwnedStatements::default(), &StatementPlan::Remove);
        assert!(changes.is_noop());
        let fields = changes.field_changes();
        assert_eq!(fields.len(), 2);
        assert!(fields.values().all(|change| *change == FieldChange::Unset));
    }
}
