//! Request-level search, lookup and disclosure service.
//!
//! # Responsibility
//! - Run each request inside one read snapshot.
//! - Validate search input before storage is touched.
//! - Collapse "not found" and "denied" into a single `Denied` result.
//!
//! # Invariants
//! - No grant data survives between calls.
//! - `Unavailable` never carries partial results.
//! - Denial reasons reach the log only.

use crate::config::VaultConfig;
use crate::db::{read_snapshot, write_snapshot, DbResult, RequestSnapshot};
use crate::model::password::{PasswordId, PasswordView, SecretValue};
use crate::model::principal::Principal;
use crate::model::tag::Tag;
use crate::policy::AccessPolicy;
use crate::repo::grant_repo::SqliteGrantRepository;
use crate::repo::password_repo::SqlitePasswordRepository;
use crate::repo::principal_repo::{PrincipalRepository, SqlitePrincipalRepository};
use crate::repo::secret_repo::SqliteSecretRepository;
use crate::repo::tag_repo::SqliteTagRepository;
use crate::repo::RepoError;
use crate::search::index::PasswordIndex;
use crate::search::query::{QueryValidationError, SearchQuery, DEFAULT_MAX_FREE_TEXT_CHARS};
use crate::tag_store::TagStore;
use crate::vault::audit::AuditSink;
use crate::vault::secret_vault::{LookupOutcome, RevealOutcome, SecretVault, VaultError};
use log::{error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Boundary error taxonomy.
#[derive(Debug)]
pub enum ServiceError {
    /// Storage unreachable or inconsistent; the caller may retry.
    Unavailable(VaultError),
    /// Missing, unauthorized or unauthenticated; not retryable.
    Denied,
    /// Malformed request, rejected before storage access.
    Validation(QueryValidationError),
}

impl ServiceError {
    /// Stable code for boundary envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Denied => "denied",
            Self::Validation(_) => "invalid_query",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(_) => write!(f, "password store is unavailable"),
            Self::Denied => write!(f, "access denied"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(err) => Some(err),
            Self::Denied => None,
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<VaultError> for ServiceError {
    fn from(value: VaultError) -> Self {
        Self::Unavailable(value)
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Unavailable(VaultError::Repo(value))
    }
}

impl From<QueryValidationError> for ServiceError {
    fn from(value: QueryValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Stateless orchestrator over one request connection.
pub struct SearchService<'conn, 'a> {
    conn: &'conn Connection,
    audit: &'a dyn AuditSink,
    max_free_text_chars: usize,
}

impl<'conn, 'a> SearchService<'conn, 'a> {
    pub fn new(conn: &'conn Connection, audit: &'a dyn AuditSink) -> Self {
        Self {
            conn,
            audit,
            max_free_text_chars: DEFAULT_MAX_FREE_TEXT_CHARS,
        }
    }

    pub fn with_config(
        conn: &'conn Connection,
        audit: &'a dyn AuditSink,
        config: &VaultConfig,
    ) -> Self {
        Self {
            max_free_text_chars: config.max_free_text_chars,
            ..Self::new(conn, audit)
        }
    }

    /// Resolves a session token. Unknown tokens are `Denied`.
    pub fn authenticate(&self, token: &str) -> Result<Principal, ServiceError> {
        let repo = SqlitePrincipalRepository::try_new(self.conn)?;
        match repo.resolve_session(token.trim())? {
            Some(principal) => Ok(principal),
            None => {
                warn!("event=authenticate module=service status=denied reason=unknown_session");
                Err(ServiceError::Denied)
            }
        }
    }

    /// Tags the principal may filter by, ordered by name.
    pub fn list_tags(&self, principal: &Principal) -> Result<Vec<Tag>, ServiceError> {
        self.in_snapshot("list_tags", principal, read_snapshot, |conn| {
            let policy = AccessPolicy::load(&SqliteGrantRepository::try_new(conn)?, principal)?;
            let store = TagStore::new(
                SqliteTagRepository::try_new(conn)?,
                SqlitePasswordRepository::try_new(conn)?,
            );
            Ok(store.list_tags(principal, &policy)?)
        })
    }

    /// Metadata rows matching `query` that the principal may list.
    pub fn search(
        &self,
        principal: &Principal,
        query: &SearchQuery,
    ) -> Result<Vec<PasswordView>, ServiceError> {
        if let Err(err) = query.validate(self.max_free_text_chars) {
            info!(
                "event=search module=service status=invalid principal_id={} error={}",
                principal.id, err
            );
            return Err(err.into());
        }

        self.in_snapshot("search", principal, read_snapshot, |conn| {
            let policy = AccessPolicy::load(&SqliteGrantRepository::try_new(conn)?, principal)?;
            let index = PasswordIndex::new(SqlitePasswordRepository::try_new(conn)?);
            let records = index.search(principal, &policy, query)?;
            Ok(records.iter().map(|record| record.to_view()).collect())
        })
    }

    /// Metadata of one record, gated on `List`.
    pub fn get_record(
        &self,
        principal: &Principal,
        id: PasswordId,
    ) -> Result<PasswordView, ServiceError> {
        self.in_snapshot("get_record", principal, read_snapshot, |conn| {
            match self.vault(conn)?.get_metadata(principal, id)? {
                LookupOutcome::Found(record) => Ok(record.to_view()),
                LookupOutcome::Withheld(_) => Err(ServiceError::Denied),
            }
        })
    }

    /// Current secret of one record, gated on `Reveal` and audited.
    ///
    /// Runs in a write snapshot because the audit row is written after the
    /// reads.
    pub fn reveal(
        &self,
        principal: &Principal,
        id: PasswordId,
    ) -> Result<SecretValue, ServiceError> {
        self.in_snapshot("reveal", principal, write_snapshot, |conn| {
            match self.vault(conn)?.reveal(principal, id)? {
                RevealOutcome::Disclosed(secret) => Ok(secret),
                RevealOutcome::Withheld(_) => Err(ServiceError::Denied),
            }
        })
    }

    fn vault<'s>(
        &self,
        conn: &'s Connection,
    ) -> Result<
        SecretVault<
            'a,
            SqlitePasswordRepository<'s>,
            SqliteSecretRepository<'s>,
            SqliteGrantRepository<'s>,
        >,
        RepoError,
    > {
        Ok(SecretVault::new(
            SqlitePasswordRepository::try_new(conn)?,
            SqliteSecretRepository::try_new(conn)?,
            SqliteGrantRepository::try_new(conn)?,
            self.audit,
        ))
    }

    fn in_snapshot<T>(
        &self,
        operation: &'static str,
        principal: &Principal,
        begin: fn(&'conn Connection) -> DbResult<RequestSnapshot<'conn>>,
        body: impl FnOnce(&Connection) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let started_at = Instant::now();
        let result = begin(self.conn)
            .map_err(|err| ServiceError::from(RepoError::from(err)))
            .and_then(|snapshot| {
                let value = body(&*snapshot)?;
                snapshot
                    .finish()
                    .map_err(|err| ServiceError::from(RepoError::from(err)))?;
                Ok(value)
            });

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event={} module=service status=ok principal_id={} duration_ms={}",
                operation, principal.id, duration_ms
            ),
            Err(ServiceError::Unavailable(err)) => error!(
                "event={} module=service status=error principal_id={} duration_ms={} error_code=unavailable error={}",
                operation, principal.id, duration_ms, err
            ),
            Err(other) => warn!(
                "event={} module=service status={} principal_id={} duration_ms={}",
                operation,
                other.code(),
                principal.id,
                duration_ms
            ),
        }
        result
    }
}
