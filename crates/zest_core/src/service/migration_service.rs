//! Record-level schema migrations.
//!
//! # Responsibility
//! - Upgrade legacy category and thesis records in place.
//! - Stamp every processed record with a per-migration marker.
//! - Persist one audit log document per run.
//!
//! # Invariants
//! - A marked record is never transformed again; re-running reports it as
//!   skipped.
//! - A run is one atomic unit: either every record and the audit log are
//!   written, or nothing is.

use crate::model::document::{
    Document, DocumentId, EntityKind, FieldChange, FieldChanges, FieldValue, NewDocument,
    Polarity, FIELD_LEGACY_CONTENT, FIELD_NAME, FIELD_TEXT,
};
use crate::model::string_list::parse_string_list;
use crate::repo::document_repo::{DocumentRepository, RepoError};
use crate::repo::write_scope::WriteScope;
use crate::service::error::ServiceResult;
use crate::service::knowledge_base::KnowledgeBase;
use crate::service::statement_reconciler::{dedup_texts, new_statement};
use log::info;
use std::fmt::{Display, Formatter, Write as _};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Label carried by every migration audit log.
pub const LABEL_MIGRATION: &str = "zest/migration";
/// Audit log field holding the migration identifier.
pub const FIELD_MIGRATION_ID: &str = "migration-id";
/// Audit log field holding the run timestamp.
pub const FIELD_RUN_AT: &str = "run-at";

/// Known record migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationKind {
    /// Category name moved from the legacy content field to `name`.
    CategoryNames,
    /// Inline statement text lists moved to statement documents.
    StatementDocuments,
}

impl MigrationKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::CategoryNames => "migrate1",
            Self::StatementDocuments => "migrate2",
        }
    }

    /// Field stamped with the run timestamp on processed records.
    pub fn marker_field(self) -> &'static str {
        match self {
            Self::CategoryNames => "zest-migrated-1",
            Self::StatementDocuments => "zest-migrated-2",
        }
    }

    pub fn cause(self) -> &'static str {
        match self {
            Self::CategoryNames => "changed category data schema",
            Self::StatementDocuments => {
                "changed statement storage from text lists to separate statement documents"
            }
        }
    }

    fn target_kind(self) -> EntityKind {
        match self {
            Self::CategoryNames => EntityKind::Category,
            Self::StatementDocuments => EntityKind::Thesis,
        }
    }

    fn event(self) -> &'static str {
        match self {
            Self::CategoryNames => "migrate_category_names",
            Self::StatementDocuments => "migrate_statement_documents",
        }
    }

    fn section_headers(self) -> (&'static str, &'static str) {
        match self {
            Self::CategoryNames => ("Migrated titles:", "Skipped titles (reason):"),
            Self::StatementDocuments => (
                "Migrated thesis titles:",
                "Skipped thesis titles (reason):",
            ),
        }
    }

    /// Label identifying audit logs of this migration.
    pub fn log_label(self) -> String {
        format!("{LABEL_MIGRATION}/{}", self.id())
    }
}

/// Why a record was left untouched by a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyMigrated,
    HasName,
    EmptyContent,
    NoStatements,
    AlreadyStatementIds,
    UnpairedStatementFields,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::AlreadyMigrated => "already migrated",
            Self::HasName => "name already set",
            Self::EmptyContent => "empty content",
            Self::NoStatements => "no statements",
            Self::AlreadyStatementIds => "statements already stored as documents",
            Self::UnpairedStatementFields => "unpaired statement fields",
        };
        f.write_str(reason)
    }
}

/// Outcome of one migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub kind: MigrationKind,
    pub run_at: OffsetDateTime,
    pub migrated: Vec<DocumentId>,
    pub skipped: Vec<(DocumentId, SkipReason)>,
    /// Audit log document written for this run.
    pub log_id: DocumentId,
}

impl MigrationReport {
    /// Audit log body.
    pub fn render(&self) -> ServiceResult<String> {
        render_log(
            self.kind,
            &format_timestamp(self.run_at)?,
            &self.migrated,
            &self.skipped,
        )
    }
}

fn render_log(
    kind: MigrationKind,
    run_at: &str,
    migrated: &[DocumentId],
    skipped: &[(DocumentId, SkipReason)],
) -> ServiceResult<String> {
    let mut body = String::new();
    write_log(&mut body, kind, run_at, migrated, skipped)
        .map_err(|err| RepoError::InvalidData(format!("failed to render migration log: {err}")))?;
    Ok(body)
}

fn write_log(
    body: &mut String,
    kind: MigrationKind,
    run_at: &str,
    migrated: &[DocumentId],
    skipped: &[(DocumentId, SkipReason)],
) -> std::fmt::Result {
    let (migrated_header, skipped_header) = kind.section_headers();
    writeln!(body, "Migration run at: {run_at}")?;
    writeln!(body, "Migration type: {}", kind.id())?;
    writeln!(body, "Migration cause: {}", kind.cause())?;
    writeln!(body, "Migrated count: {}", migrated.len())?;
    writeln!(body, "Skipped count: {}", skipped.len())?;
    writeln!(body)?;
    writeln!(body, "{migrated_header}")?;
    for id in migrated {
        writeln!(body, "- {id}")?;
    }
    writeln!(body)?;
    writeln!(body, "{skipped_header}")?;
    for (id, reason) in skipped {
        writeln!(body, "- {id} ({reason})")?;
    }
    Ok(())
}

fn format_timestamp(at: OffsetDateTime) -> ServiceResult<String> {
    at.format(&Rfc3339)
        .map_err(|err| RepoError::InvalidData(format!("invalid run timestamp: {err}")).into())
}

/// Per-record decision of one migration step.
enum Outcome {
    Migrated,
    Skipped(SkipReason),
}

impl<R: DocumentRepository> KnowledgeBase<R> {
    /// Runs the category name migration stamped with the current UTC time.
    pub fn migrate_category_names(&mut self) -> ServiceResult<MigrationReport> {
        self.migrate_category_names_at(OffsetDateTime::now_utc())
    }

    pub fn migrate_category_names_at(
        &mut self,
        run_at: OffsetDateTime,
    ) -> ServiceResult<MigrationReport> {
        self.run_migration(MigrationKind::CategoryNames, run_at)
    }

    /// Runs the statement document migration stamped with the current UTC time.
    pub fn migrate_statement_documents(&mut self) -> ServiceResult<MigrationReport> {
        self.migrate_statement_documents_at(OffsetDateTime::now_utc())
    }

    pub fn migrate_statement_documents_at(
        &mut self,
        run_at: OffsetDateTime,
    ) -> ServiceResult<MigrationReport> {
        self.run_migration(MigrationKind::StatementDocuments, run_at)
    }

    fn run_migration(
        &mut self,
        kind: MigrationKind,
        run_at: OffsetDateTime,
    ) -> ServiceResult<MigrationReport> {
        let stamp = format_timestamp(run_at)?;
        let report = self.execute(kind.event(), |scope| {
            let mut migrated = Vec::new();
            let mut skipped = Vec::new();
            for id in scope.repo().list_ids_by_kind(kind.target_kind())? {
                let Some(document) = scope.get_document(&id)? else {
                    continue;
                };
                let outcome = match kind {
                    MigrationKind::CategoryNames => migrate_category(scope, &document, &stamp)?,
                    MigrationKind::StatementDocuments => {
                        migrate_thesis(scope, &document, &stamp)?
                    }
                };
                match outcome {
                    Outcome::Migrated => migrated.push(id),
                    Outcome::Skipped(reason) => skipped.push((id, reason)),
                }
            }

            let log_id = DocumentId::generate(EntityKind::MigrationLog);
            let body = render_log(kind, &stamp, &migrated, &skipped)?;
            let log = Document::new(log_id.clone(), EntityKind::MigrationLog)
                .with_field(FIELD_TEXT, FieldValue::Text(body))
                .with_field(FIELD_MIGRATION_ID, FieldValue::text(kind.id()))
                .with_field(FIELD_RUN_AT, FieldValue::text(stamp.as_str()))
                .with_label(LABEL_MIGRATION)
                .with_label(kind.log_label());
            scope.create(&NewDocument::new(log))?;

            Ok(MigrationReport {
                kind,
                run_at,
                migrated,
                skipped,
                log_id,
            })
        })?;

        info!(
            "event={} module=migration status=ok migration={} migrated={} skipped={}",
            kind.event(),
            kind.id(),
            report.migrated.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

fn marker_change(kind: MigrationKind, stamp: &str) -> (String, FieldChange) {
    (
        kind.marker_field().to_string(),
        FieldChange::Set(FieldValue::text(stamp)),
    )
}

fn migrate_category<R: DocumentRepository>(
    scope: &mut WriteScope<'_, R>,
    category: &Document,
    stamp: &str,
) -> ServiceResult<Outcome> {
    let kind = MigrationKind::CategoryNames;
    if category.field(kind.marker_field()).is_some() {
        return Ok(Outcome::Skipped(SkipReason::AlreadyMigrated));
    }
    if category
        .text_field(FIELD_NAME)
        .is_some_and(|name| !name.trim().is_empty())
    {
        return Ok(Outcome::Skipped(SkipReason::HasName));
    }
    let content = category
        .text_field(FIELD_LEGACY_CONTENT)
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::EmptyContent));
    }

    let mut changes = FieldChanges::new();
    changes.insert(
        FIELD_NAME.to_string(),
        FieldChange::Set(FieldValue::text(content)),
    );
    changes.insert(FIELD_LEGACY_CONTENT.to_string(), FieldChange::Unset);
    let (marker, value) = marker_change(kind, stamp);
    changes.insert(marker, value);
    scope.update(&category.id, &changes)?;
    Ok(Outcome::Migrated)
}

/// Reads one statement list field in either encoding.
fn statement_entries(thesis: &Document, polarity: Polarity) -> Option<Vec<String>> {
    match thesis.field(polarity.list_field())? {
        FieldValue::Text(encoded) => Some(parse_string_list(encoded)),
        FieldValue::List(items) => Some(items.clone()),
    }
}

fn non_blank(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn migrate_thesis<R: DocumentRepository>(
    scope: &mut WriteScope<'_, R>,
    thesis: &Document,
    stamp: &str,
) -> ServiceResult<Outcome> {
    let kind = MigrationKind::StatementDocuments;
    if thesis.field(kind.marker_field()).is_some() {
        return Ok(Outcome::Skipped(SkipReason::AlreadyMigrated));
    }

    let mut changes = FieldChanges::new();
    let (marker, value) = marker_change(kind, stamp);
    changes.insert(marker, value);

    let (correct, incorrect) = match (
        statement_entries(thesis, Polarity::Correct),
        statement_entries(thesis, Polarity::Incorrect),
    ) {
        (None, None) => {
            scope.update(&thesis.id, &changes)?;
            return Ok(Outcome::Skipped(SkipReason::NoStatements));
        }
        (Some(correct), Some(incorrect)) => (non_blank(&correct), non_blank(&incorrect)),
        _ => return Ok(Outcome::Skipped(SkipReason::UnpairedStatementFields)),
    };

    if correct.is_empty() && incorrect.is_empty() {
        for polarity in [Polarity::Correct, Polarity::Incorrect] {
            changes.insert(polarity.list_field().to_string(), FieldChange::Unset);
        }
        scope.update(&thesis.id, &changes)?;
        return Ok(Outcome::Skipped(SkipReason::NoStatements));
    }

    if correct.is_empty() || incorrect.is_empty() {
        return Ok(Outcome::Skipped(SkipReason::UnpairedStatementFields));
    }

    if correct
        .iter()
        .chain(incorrect.iter())
        .all(|entry| DocumentId::new(entry.as_str()).looks_like(EntityKind::Statement))
    {
        for (polarity, entries) in [(Polarity::Correct, &correct), (Polarity::Incorrect, &incorrect)] {
            changes.insert(
                polarity.list_field().to_string(),
                FieldChange::Set(FieldValue::List(entries.clone())),
            );
        }
        scope.update(&thesis.id, &changes)?;
        return Ok(Outcome::Skipped(SkipReason::AlreadyStatementIds));
    }

    let mut created = Vec::new();
    for (polarity, texts) in [(Polarity::Correct, correct), (Polarity::Incorrect, incorrect)] {
        let statements: Vec<NewDocument> = dedup_texts(texts)
            .iter()
            .map(|text| new_statement(&thesis.id, polarity, text))
            .collect();
        let ids: Vec<DocumentId> = statements
            .iter()
            .map(|statement| statement.document.id.clone())
            .collect();
        changes.insert(
            polarity.list_field().to_string(),
            FieldChange::Set(FieldValue::ids(&ids)),
        );
        created.extend(statements);
    }

    scope.update(&thesis.id, &changes)?;
    for statement in &created {
        scope.create(statement)?;
    }
    Ok(Outcome::Migrated)
}
