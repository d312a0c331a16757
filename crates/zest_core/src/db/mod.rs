//! Knowledge base file layer.
//!
//! Every record lives in one `documents` table. Typed relationship edges sit
//! in `document_links` and free-form labels in `document_labels`; both
//! cascade away with their document.
//!
//! # Invariants
//! - `PRAGMA user_version` equals the number of applied table migrations.
//! - A file written by a newer build is refused untouched.
//!
//! Record upgrades (legacy category names, inline statement lists) are not
//! handled here; see `service::migration_service`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or upgrading a knowledge base file.
#[derive(Debug)]
pub enum DbError {
    /// SQLite rejected a statement or the file itself.
    Sqlite(rusqlite::Error),
    /// The file records more table migrations than this build knows.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Whether the file was produced by a newer build.
    pub fn is_schema_too_new(&self) -> bool {
        matches!(self, Self::UnsupportedSchemaVersion { .. })
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "knowledge base file uses table layout v{db_version}; this build reads up to v{latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
