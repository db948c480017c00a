//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from policy and service orchestration.
//!
//! # Invariants
//! - Repositories are constructed only over fully migrated connections.
//! - Write paths validate input before any SQL mutation.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::grant::GrantValidationError;
use crate::model::password::{PasswordId, PasswordValidationError};
use crate::model::principal::PrincipalId;
use crate::model::tag::{TagId, TagValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod grant_repo;
pub mod password_repo;
pub mod principal_repo;
pub mod secret_repo;
pub mod tag_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all vault stores.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    PasswordNotFound(PasswordId),
    TagNotFound(TagId),
    PrincipalNotFound(PrincipalId),
    DuplicateTagName(String),
    DuplicateName(String),
    /// Blank principal or group name; carries the entity kind.
    EmptyName(&'static str),
    InvalidTag(TagValidationError),
    InvalidPassword(PasswordValidationError),
    InvalidGrant(GrantValidationError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::PasswordNotFound(id) => write!(f, "password not found: {id}"),
            Self::TagNotFound(id) => write!(f, "tag not found: {id}"),
            Self::PrincipalNotFound(id) => write!(f, "principal not found: {id}"),
            Self::DuplicateTagName(name) => write!(f, "tag name already exists: `{name}`"),
            Self::DuplicateName(name) => write!(f, "name already exists: `{name}`"),
            Self::EmptyName(kind) => write!(f, "{kind} name must not be empty"),
            Self::InvalidTag(err) => write!(f, "{err}"),
            Self::InvalidPassword(err) => write!(f, "{err}"),
            Self::InvalidGrant(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted vault data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidTag(err) => Some(err),
            Self::InvalidPassword(err) => Some(err),
            Self::InvalidGrant(err) => Some(err),
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

impl From<TagValidationError> for RepoError {
    fn from(value: TagValidationError) -> Self {
        Self::InvalidTag(value)
    }
}

impl From<PasswordValidationError> for RepoError {
    fn from(value: PasswordValidationError) -> Self {
        Self::InvalidPassword(value)
    }
}

impl From<GrantValidationError> for RepoError {
    fn from(value: GrantValidationError) -> Self {
        Self::InvalidGrant(value)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(code, _)
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn parse_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
