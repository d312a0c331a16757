//! Document repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide point lookup, kind/label listing, relationship traversal and
//!   document create/update/delete primitives.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Links may only reference stored documents.
//! - Deleting a document removes every link where it is child or parent.
//! - `atomically` either applies every mutation of its closure or none.

use crate::db::DbError;
use crate::model::document::{
    Document, DocumentId, EntityKind, FieldChanges, FieldValue, NewDocument, Relation,
};
use log::debug;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-level error for document operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(DocumentId),
    AlreadyExists(DocumentId),
    /// A record was mutated twice within one engine operation.
    AlreadyLocked(DocumentId),
    MissingRequiredTable(&'static str),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::AlreadyExists(id) => write!(f, "document already exists: {id}"),
            Self::AlreadyLocked(id) => write!(f, "document is already locked: {id}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "document repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted document data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Document-store contract consumed by the engine.
pub trait DocumentRepository {
    /// Loads one document by id.
    fn get_document(&self, id: &DocumentId) -> RepoResult<Option<Document>>;
    /// Lists ids of every document of one kind.
    fn list_ids_by_kind(&self, kind: EntityKind) -> RepoResult<Vec<DocumentId>>;
    /// Lists ids of every document carrying `label`.
    fn list_ids_with_label(&self, label: &str) -> RepoResult<Vec<DocumentId>>;
    /// Lists children linked to `parent` through `relation`.
    fn list_children(&self, parent: &DocumentId, relation: Relation)
        -> RepoResult<Vec<DocumentId>>;
    /// Lists parents `child` is linked to through `relation`.
    fn list_parents(&self, child: &DocumentId, relation: Relation) -> RepoResult<Vec<DocumentId>>;
    /// Stores a new document together with its outgoing links.
    fn create_document(&mut self, new: &NewDocument) -> RepoResult<()>;
    /// Applies field changes; `FieldChange::Unset` removes a field.
    fn update_fields(&mut self, id: &DocumentId, changes: &FieldChanges) -> RepoResult<()>;
    /// Adds one link. Returns `false` when it already existed.
    fn add_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool>;
    /// Removes one link. Returns `false` when it did not exist.
    fn remove_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool>;
    /// Deletes one document and every link touching it.
    fn delete_document(&mut self, id: &DocumentId) -> RepoResult<()>;
    /// Runs `f` as one unit, discarding its mutations when it fails.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<RepoError>,
        F: FnOnce(&mut Self) -> Result<T, E>;

    /// Whether `id` resolves to a document of `kind`.
    fn exists_as(&self, id: &DocumentId, kind: EntityKind) -> RepoResult<bool> {
        Ok(self
            .get_document(id)?
            .is_some_and(|document| document.kind == kind))
    }
}

/// SQLite-backed document repository.
#[derive(Debug)]
pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_document_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn get_document(&self, id: &DocumentId) -> RepoResult<Option<Document>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, kind, fields FROM documents WHERE id = ?1;")?;
        let mut rows = stmt.query([id.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let kind_text: String = row.get("kind")?;
        let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid kind `{kind_text}` in documents.kind"))
        })?;
        let fields_json: String = row.get("fields")?;
        let fields: BTreeMap<String, FieldValue> =
            serde_json::from_str(&fields_json).map_err(|err| {
                RepoError::InvalidData(format!("invalid fields for `{id}` in documents.fields: {err}"))
            })?;

        Ok(Some(Document {
            id: id.clone(),
            kind,
            fields,
            labels: load_labels(self.conn, id)?,
        }))
    }

    fn list_ids_by_kind(&self, kind: EntityKind) -> RepoResult<Vec<DocumentId>> {
        query_ids(
            self.conn,
            "SELECT id FROM documents WHERE kind = ?1 ORDER BY rowid ASC;",
            params![kind.as_str()],
        )
    }

    fn list_ids_with_label(&self, label: &str) -> RepoResult<Vec<DocumentId>> {
        query_ids(
            self.conn,
            "SELECT l.document_id
             FROM document_labels l
             INNER JOIN documents d ON d.id = l.document_id
             WHERE l.label = ?1
             ORDER BY d.rowid ASC;",
            params![label],
        )
    }

    fn list_children(
        &self,
        parent: &DocumentId,
        relation: Relation,
    ) -> RepoResult<Vec<DocumentId>> {
        query_ids(
            self.conn,
            "SELECT child_id FROM document_links
             WHERE parent_id = ?1 AND relation = ?2
             ORDER BY rowid ASC;",
            params![parent.as_str(), relation.as_str()],
        )
    }

    fn list_parents(&self, child: &DocumentId, relation: Relation) -> RepoResult<Vec<DocumentId>> {
        query_ids(
            self.conn,
            "SELECT parent_id FROM document_links
             WHERE child_id = ?1 AND relation = ?2
             ORDER BY rowid ASC;",
            params![child.as_str(), relation.as_str()],
        )
    }

    fn create_document(&mut self, new: &NewDocument) -> RepoResult<()> {
        let document = &new.document;
        if document_exists(self.conn, &document.id)? {
            return Err(RepoError::AlreadyExists(document.id.clone()));
        }
        for link in &new.links {
            if !document_exists(self.conn, &link.parent)? {
                return Err(RepoError::NotFound(link.parent.clone()));
            }
        }

        self.conn.execute(
            "INSERT INTO documents (id, kind, fields) VALUES (?1, ?2, ?3);",
            params![
                document.id.as_str(),
                document.kind.as_str(),
                encode_fields(&document.fields)?,
            ],
        )?;
        for label in &document.labels {
            self.conn.execute(
                "INSERT INTO document_labels (document_id, label) VALUES (?1, ?2);",
                params![document.id.as_str(), label.as_str()],
            )?;
        }
        for link in &new.links {
            self.conn.execute(
                "INSERT OR IGNORE INTO document_links (child_id, relation, parent_id)
                 VALUES (?1, ?2, ?3);",
                params![
                    document.id.as_str(),
                    link.relation.as_str(),
                    link.parent.as_str()
                ],
            )?;
        }

        debug!(
            "event=document_create module=repo status=ok kind={} links={}",
            document.kind,
            new.links.len()
        );
        Ok(())
    }

    fn update_fields(&mut self, id: &DocumentId, changes: &FieldChanges) -> RepoResult<()> {
        let mut document = self
            .get_document(id)?
            .ok_or_else(|| RepoError::NotFound(id.clone()))?;
        document.apply_changes(changes);

        self.conn.execute(
            "UPDATE documents
             SET
                fields = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.as_str(), encode_fields(&document.fields)?],
        )?;
        Ok(())
    }

    fn add_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        for id in [child, parent] {
            if !document_exists(self.conn, id)? {
                return Err(RepoError::NotFound(id.clone()));
            }
        }
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO document_links (child_id, relation, parent_id)
             VALUES (?1, ?2, ?3);",
            params![child.as_str(), relation.as_str(), parent.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn remove_link(
        &mut self,
        child: &DocumentId,
        relation: Relation,
        parent: &DocumentId,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM document_links
             WHERE child_id = ?1 AND relation = ?2 AND parent_id = ?3;",
            params![child.as_str(), relation.as_str(), parent.as_str()],
        )?;
        Ok(changed == 1)
    }

    fn delete_document(&mut self, id: &DocumentId) -> RepoResult<()> {
        // Link and label rows cascade through foreign keys.
        let changed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1;", [id.as_str()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<RepoError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let conn = self.conn;
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let output = f(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(output)
    }
}

fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> RepoResult<String> {
    serde_json::to_string(fields)
        .map_err(|err| RepoError::InvalidData(format!("fields are not serializable: {err}")))
}

fn query_ids(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> RepoResult<Vec<DocumentId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(DocumentId::new(value));
    }
    Ok(ids)
}

fn load_labels(conn: &Connection, id: &DocumentId) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT label FROM document_labels WHERE document_id = ?1;")?;
    let mut rows = stmt.query([id.as_str()])?;
    let mut labels = BTreeSet::new();
    while let Some(row) = rows.next()? {
        labels.insert(row.get::<_, String>(0)?);
    }
    Ok(labels)
}

fn document_exists(conn: &Connection, id: &DocumentId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1);",
        [id.as_str()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn ensure_document_connection_ready(conn: &Connection) -> RepoResult<()> {
    for table in ["documents", "document_links", "document_labels"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
