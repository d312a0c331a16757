//! Engine error type.
//!
//! The `Display` text of a `ServiceError` is the single alert message a caller
//! shows for a failed operation.

use crate::model::document::EntityKind;
use crate::repo::document_repo::RepoError;
use crate::service::statement_reconciler::StatementError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug)]
pub enum ServiceError {
    /// Identifier parameter is missing or blank.
    IdRequired(EntityKind),
    /// Required value is missing or blank. Carries the user-facing label.
    EmptyField(&'static str),
    /// Identifier does not resolve to a document of the expected kind.
    NotFound(EntityKind),
    /// Another domain already uses the requested name.
    DuplicateDomainName,
    /// Domain still has linked categories.
    DomainHasCategories,
    /// Detach would leave a category without domains.
    LastDomainLink,
    /// Detach would leave a thesis without categories.
    LastCategoryLink,
    /// Detach target category is not linked to the thesis.
    ThesisNotLinked,
    /// Statement input failed validation.
    Statements(StatementError),
    /// Storage failure.
    Repo(RepoError),
}

impl ServiceError {
    /// Whether this failure was detected by validation rather than storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Self::Repo(_))
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdRequired(kind) => write!(f, "{} id is required", kind.display_name()),
            Self::EmptyField(label) => write!(f, "{label} cannot be empty"),
            Self::NotFound(kind) => write!(f, "{} not found", kind.display_name()),
            Self::DuplicateDomainName => write!(f, "Domain with this name already exists"),
            Self::DomainHasCategories => write!(
                f,
                "Cannot delete domain: categories are still linked to this domain"
            ),
            Self::LastDomainLink => write!(
                f,
                "Cannot detach: category must be linked to at least one domain"
            ),
            Self::LastCategoryLink => write!(
                f,
                "Cannot detach: thesis must be linked to at least one category"
            ),
            Self::ThesisNotLinked => write!(f, "Thesis is not linked to this category"),
            Self::Statements(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Statements(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<StatementError> for ServiceError {
    fn from(value: StatementError) -> Self {
        Self::Statements(value)
    }
}
