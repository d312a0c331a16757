//! Document model.
//!
//! # Responsibility
//! - Define identifiers, kinds, field values and relationship edges.
//! - Provide typed accessors used by services and migrations.
//!
//! # Invariants
//! - Generated ids carry the `zest/<kind>/` prefix of their kind.
//! - Statement lists are stored as `FieldValue::List` of statement ids; a
//!   `FieldValue::Text` list is the legacy encoding and only read by migrations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_TEXT: &str = "text";
pub const FIELD_NOTE: &str = "note";
pub const FIELD_CORRECT_STATEMENTS: &str = "correct-statements";
pub const FIELD_INCORRECT_STATEMENTS: &str = "incorrect-statements";
pub const FIELD_POLARITY: &str = "polarity";
/// Pre-migrate1 category field that held the category name.
pub const FIELD_LEGACY_CONTENT: &str = "content";

/// Label stamped on new theses so the spaced-repetition scheduler picks them up.
pub const LABEL_SCHEDULED_FORWARD: &str = "srs/scheduled-forward";

/// Closed set of record kinds stored in the document table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Domain,
    Category,
    Thesis,
    Statement,
    /// Transient statement input awaiting consumption by a thesis operation.
    Draft,
    /// Audit document written by a migration run.
    MigrationLog,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Domain,
        EntityKind::Category,
        EntityKind::Thesis,
        EntityKind::Statement,
        EntityKind::Draft,
        EntityKind::MigrationLog,
    ];

    /// Storage discriminant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Category => "category",
            Self::Thesis => "thesis",
            Self::Statement => "statement",
            Self::Draft => "draft",
            Self::MigrationLog => "migration_log",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }

    /// Prefix shared by every generated id of this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Domain => "zest/domain/",
            Self::Category => "zest/category/",
            Self::Thesis => "zest/thesis/",
            Self::Statement => "zest/statement/",
            Self::Draft => "zest/draft/",
            Self::MigrationLog => "zest/migration/",
        }
    }

    /// Human-facing name used in alert messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Domain => "Domain",
            Self::Category => "Category",
            Self::Thesis => "Thesis",
            Self::Statement => "Statement",
            Self::Draft => "Draft",
            Self::MigrationLog => "Migration log",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique document title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh id carrying the kind prefix.
    pub fn generate(kind: EntityKind) -> Self {
        Self(format!("{}{}", kind.id_prefix(), Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id has the shape of a generated id of `kind`.
    pub fn looks_like(&self, kind: EntityKind) -> bool {
        self.0
            .strip_prefix(kind.id_prefix())
            .is_some_and(|rest| !rest.is_empty())
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Value stored under one field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn ids(ids: &[DocumentId]) -> Self {
        Self::List(ids.iter().map(|id| id.as_str().to_string()).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            Self::List(_) => None,
        }
    }
}

/// One requested field mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldChange {
    Set(FieldValue),
    /// Removes the field from the document.
    Unset,
}

impl FieldChange {
    /// `Set` for a present value, `Unset` otherwise.
    pub fn text_or_unset(value: Option<String>) -> Self {
        match value {
            Some(value) => Self::Set(FieldValue::Text(value)),
            None => Self::Unset,
        }
    }
}

/// Ordered set of field mutations applied in one update.
pub type FieldChanges = BTreeMap<String, FieldChange>;

/// Typed relationship edge, always stored from child to parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    /// Category (child) linked to a domain (parent). Many-to-many.
    CategoryDomain,
    /// Thesis (child) linked to a category (parent). Many-to-many.
    ThesisCategory,
    /// Statement (child) owned by exactly one thesis (parent).
    StatementThesis,
}

impl Relation {
    pub const ALL: [Relation; 3] = [
        Relation::CategoryDomain,
        Relation::ThesisCategory,
        Relation::StatementThesis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CategoryDomain => "category_domain",
            Self::ThesisCategory => "thesis_category",
            Self::StatementThesis => "statement_thesis",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|relation| relation.as_str() == value)
    }

    pub fn child_kind(self) -> EntityKind {
        match self {
            Self::CategoryDomain => EntityKind::Category,
            Self::ThesisCategory => EntityKind::Thesis,
            Self::StatementThesis => EntityKind::Statement,
        }
    }

    pub fn parent_kind(self) -> EntityKind {
        match self {
            Self::CategoryDomain => EntityKind::Domain,
            Self::ThesisCategory => EntityKind::Category,
            Self::StatementThesis => EntityKind::Thesis,
        }
    }
}

/// Statement correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Correct,
    Incorrect,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            _ => None,
        }
    }

    /// Thesis field holding the statement list of this polarity.
    pub fn list_field(self) -> &'static str {
        match self {
            Self::Correct => FIELD_CORRECT_STATEMENTS,
            Self::Incorrect => FIELD_INCORRECT_STATEMENTS,
        }
    }
}

/// Stored document read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub kind: EntityKind,
    pub fields: BTreeMap<String, FieldValue>,
    pub labels: BTreeSet<String>,
}

impl Document {
    pub fn new(id: DocumentId, kind: EntityKind) -> Self {
        Self {
            id,
            kind,
            fields: BTreeMap::new(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    pub fn with_text(self, name: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.with_field(name, FieldValue::Text(value)),
            None => self,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text value of a field, `None` when absent or list-valued.
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    /// Statement ids referenced by a thesis list field.
    ///
    /// Returns an empty list for an absent field and for the legacy text
    /// encoding, which is not a list of ids.
    pub fn statement_ids(&self, polarity: Polarity) -> Vec<DocumentId> {
        match self.fields.get(polarity.list_field()) {
            Some(FieldValue::List(items)) => items.iter().map(|item| DocumentId::new(item.as_str())).collect(),
            _ => Vec::new(),
        }
    }

    pub fn polarity(&self) -> Option<Polarity> {
        self.text_field(FIELD_POLARITY).and_then(Polarity::parse)
    }

    /// Applies field changes in place.
    pub fn apply_changes(&mut self, changes: &FieldChanges) {
        for (name, change) in changes {
            match change {
                FieldChange::Set(value) => {
                    self.fields.insert(name.clone(), value.clone());
                }
                FieldChange::Unset => {
                    self.fields.remove(name);
                }
            }
        }
    }
}

/// One child-to-parent edge to create together with a new document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub relation: Relation,
    pub parent: DocumentId,
}

impl Link {
    pub fn new(relation: Relation, parent: DocumentId) -> Self {
        Self { relation, parent }
    }
}

/// Write model for document creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub document: Document,
    pub links: Vec<Link>,
}

impl NewDocument {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            links: Vec::new(),
        }
    }

    pub fn linked_to(mut self, relation: Relation, parent: DocumentId) -> Self {
        self.links.push(Link::new(relation, parent));
        self
    }
}

/// Trims a raw input value, mapping blank input to `None`.
pub fn trim_to_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_carry_kind_prefix() {
        let id = DocumentId::generate(EntityKind::Statement);
        assert!(id.as_str().starts_with("zest/statement/"));
        assert!(id.looks_like(EntityKind::Statement));
        assert!(!id.looks_like(EntityKind::Thesis));
        assert!(!DocumentId::new("zest/statement/").looks_like(EntityKind::Statement));
    }

    #[test]
    fn kind_and_relation_discriminants_parse_back() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        for relation in Relation::ALL {
            assert_eq!(Relation::parse(relation.as_str()), Some(relation));
        }
        assert_eq!(EntityKind::parse("tiddler"), None);
    }

    #[test]
    fn field_values_serialize_as_plain_json() {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), FieldValue::text("Physics"));
        fields.insert(
            "correct-statements".to_string(),
            FieldValue::List(vec!["zest/statement/a".to_string()]),
        );
        let json = serde_json::to_string(&fields).expect("fields should serialize");
        assert_eq!(
            json,
            r#"{"correct-statements":["zest/statement/a"],"name":"Physics"}"#
        );
        let parsed: BTreeMap<String, FieldValue> =
            serde_json::from_str(&json).expect("fields should deserialize");
        assert_eq!(parsed, fields);
    }

    #[test]
    fn apply_changes_sets_and_unsets() {
        let mut doc = Document::new(DocumentId::new("d"), EntityKind::Domain)
            .with_field(FIELD_NAME, FieldValue::text("old"))
            .with_field(FIELD_DESCRIPTION, FieldValue::text("desc"));
        let mut changes = FieldChanges::new();
        changes.insert(FIELD_NAME.to_string(), FieldChange::Set(FieldValue::text("new")));
        changes.insert(FIELD_DESCRIPTION.to_string(), FieldChange::Unset);
        doc.apply_changes(&changes);
        assert_eq!(doc.text_field(FIELD_NAME), Some("new"));
        assert_eq!(doc.field(FIELD_DESCRIPTION), None);
    }

    #[test]
    fn trim_to_none_drops_blank_values() {
        assert_eq!(trim_to_none(Some("  x ")), Some("x".to_string()));
        assert_eq!(trim_to_none(Some(" \n ")), None);
        assert_eq!(trim_to_none(None), None);
    }
}
