//! Gateway layer: named query methods over the module tables.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per module.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate their input model before SQL mutations.
//! - Gateways return semantic errors (`NotFound`) in addition to DB
//!   transport errors.
//! - Read paths reject unknown enum values instead of masking them.

use crate::db::DbError;
use crate::model::{RecordId, ValidationError};
use rusqlite::Row;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod care_repo;
pub mod document_repo;
pub mod finance_repo;
pub mod photo_repo;
pub mod sync_log_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic gateway error shared by every module.
#[derive(Debug)]
pub enum RepoError {
    Validation(ValidationError),
    Db(DbError),
    NotFound {
        entity: &'static str,
        id: RecordId,
    },
    InvalidData(String),
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: RecordId) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns whether the underlying SQLite error is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
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

/// Reads a text column and maps it through an enum parser.
pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<T> {
    let text: String = row.get(column)?;
    parse(&text)
        .ok_or_else(|| RepoError::InvalidData(format!("unknown value `{text}` in {column}")))
}

/// Nullable variant of [`enum_column`].
pub(crate) fn optional_enum_column<T>(
    row: &Row<'_>,
    column: &'static str,
    parse: fn(&str) -> Option<T>,
) -> RepoResult<Option<T>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse(&text).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!("unknown value `{text}` in {column}"))
        }),
        None => Ok(None),
    }
}
