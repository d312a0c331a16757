use time::macros::datetime;
use zest_core::model::string_list::stringify_list;
use zest_core::{
    open_db, Document, DocumentId, DocumentRepository, EntityKind, FieldValue, KnowledgeBase,
    NewDocument, Polarity, Relation, SkipReason, SqliteDocumentRepository,
};

fn seed_legacy_store(repo: &mut SqliteDocumentRepository<'_>) {
    let documents = [
        NewDocument::new(
            Document::new(DocumentId::new("zest/domain/d"), EntityKind::Domain)
                .with_field("name", FieldValue::text("D")),
        ),
        NewDocument::new(
            Document::new(DocumentId::new("zest/category/old"), EntityKind::Category)
                .with_field("content", FieldValue::text(" Old name ")),
        )
        .linked_to(Relation::CategoryDomain, DocumentId::new("zest/domain/d")),
        NewDocument::new(
            Document::new(DocumentId::new("zest/category/new"), EntityKind::Category)
                .with_field("name", FieldValue::text("New name")),
        )
        .linked_to(Relation::CategoryDomain, DocumentId::new("zest/domain/d")),
        NewDocument::new(
            Document::new(DocumentId::new("zest/thesis/inline"), EntityKind::Thesis)
                .with_field("text", FieldValue::text("Inline"))
                .with_field(
                    Polarity::Correct.list_field(),
                    FieldValue::text(stringify_list(&[
                        "first one".to_string(),
                        "second".to_string(),
                    ])),
                )
                .with_field(Polarity::Incorrect.list_field(), FieldValue::text("wrong")),
        )
        .linked_to(Relation::ThesisCategory, DocumentId::new("zest/category/old")),
        NewDocument::new(
            Document::new(DocumentId::new("zest/thesis/bare"), EntityKind::Thesis)
                .with_field("text", FieldValue::text("Bare")),
        )
        .linked_to(Relation::ThesisCategory, DocumentId::new("zest/category/new")),
    ];
    for document in &documents {
        repo.create_document(document).unwrap();
    }
}

fn snapshot(repo: &SqliteDocumentRepository<'_>) -> Vec<Document> {
    let mut documents = Vec::new();
    for kind in [EntityKind::Category, EntityKind::Thesis, EntityKind::Statement] {
        for id in repo.list_ids_by_kind(kind).unwrap() {
            documents.push(repo.get_document(&id).unwrap().unwrap());
        }
    }
    documents
}

#[test]
fn migrations_upgrade_legacy_records_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("zest.db")).unwrap();
    let mut repo = SqliteDocumentRepository::try_new(&conn).unwrap();
    seed_legacy_store(&mut repo);
    let mut kb = KnowledgeBase::new(repo);

    let first = kb
        .migrate_category_names_at(datetime!(2024-05-01 08:00 UTC))
        .unwrap();
    assert_eq!(first.migrated, vec![DocumentId::new("zest/category/old")]);
    assert_eq!(
        first.skipped,
        vec![(DocumentId::new("zest/category/new"), SkipReason::HasName)]
    );

    let statements = kb
        .migrate_statement_documents_at(datetime!(2024-05-01 08:01 UTC))
        .unwrap();
    assert_eq!(statements.migrated, vec![DocumentId::new("zest/thesis/inline")]);
    assert_eq!(
        statements.skipped,
        vec![(DocumentId::new("zest/thesis/bare"), SkipReason::NoStatements)]
    );
    assert!(kb.check_integrity().unwrap().is_clean());

    let after_first = snapshot(kb.repo());

    let second = kb
        .migrate_category_names_at(datetime!(2024-05-02 08:00 UTC))
        .unwrap();
    assert!(second.migrated.is_empty());
    assert_eq!(
        second.skipped,
        vec![
            (DocumentId::new("zest/category/old"), SkipReason::AlreadyMigrated),
            (DocumentId::new("zest/category/new"), SkipReason::HasName),
        ]
    );
    let second_statements = kb
        .migrate_statement_documents_at(datetime!(2024-05-02 08:01 UTC))
        .unwrap();
    assert!(second_statements.migrated.is_empty());
    assert!(second_statements
        .skipped
        .iter()
        .all(|(_, reason)| *reason == SkipReason::AlreadyMigrated));

    assert_eq!(snapshot(kb.repo()), after_first);
    assert_eq!(
        kb.repo()
            .list_ids_by_kind(EntityKind::MigrationLog)
            .unwrap()
            .len(),
        4
    );
}

#[test]
fn audit_log_lists_counts_and_sections() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open_db(dir.path().join("zest.db")).unwrap();
    let mut repo = SqliteDocumentRepository::try_new(&conn).unwrap();
    seed_legacy_store(&mut repo);
    let mut kb = KnowledgeBase::new(repo);

    let report = kb
        .migrate_statement_documents_at(datetime!(2024-05-01 08:00 UTC))
        .unwrap();
    let log = kb.get_document(&report.log_id).unwrap().unwrap();
    let body = log.text_field("text").unwrap();

    assert_eq!(
        body,
        "Migration run at: 2024-05-01T08:00:00Z\n\
         Migration type: migrate2\n\
         Migration cause: changed statement storage from text lists to separate statement documents\n\
         Migrated count: 1\n\
         Skipped count: 1\n\
         \n\
         Migrated thesis titles:\n\
         - zest/thesis/inline\n\
         \n\
         Skipped thesis titles (reason):\n\
         - zest/thesis/bare (no statements)\n"
    );
    assert!(log.labels.contains("zest/migration/migrate2"));
    assert_eq!(
        kb.repo().list_ids_with_label("zest/migration").unwrap(),
        vec![report.log_id.clone()]
    );

    let thesis = kb
        .get_document(&DocumentId::new("zest/thesis/inline"))
        .unwrap()
        .unwrap();
    let correct: Vec<String> = thesis
        .statement_ids(Polarity::Correct)
        .iter()
        .map(|id| {
            kb.get_document(id)
                .unwrap()
                .unwrap()
                .text_field("text")
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(correct, ["first one", "second"]);
}
