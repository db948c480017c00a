//! Core domain logic for the password vault.
//! This crate is the single source of truth for access and disclosure rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod search;
pub mod service;
pub mod tag_store;
pub mod vault;

pub use config::{ConfigError, VaultConfig};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::grant::{AccessGrant, Action, GrantValidationError, Permissions};
pub use model::password::{
    PasswordDraft, PasswordId, PasswordRecord, PasswordValidationError, PasswordView, SecretValue,
};
pub use model::principal::{GroupId, Principal, PrincipalId, Subject};
pub use model::tag::{Tag, TagId, TagValidationError};
pub use policy::{AccessPolicy, Decision, DenyReason};
pub use repo::grant_repo::{GrantRepository, SqliteGrantRepository};
pub use repo::password_repo::{PasswordRepository, RecordFilter, SqlitePasswordRepository};
pub use repo::principal_repo::{PrincipalRepository, SqlitePrincipalRepository};
pub use repo::secret_repo::{SecretRepository, SqliteSecretRepository};
pub use repo::tag_repo::{SqliteTagRepository, TagRepository};
pub use repo::{RepoError, RepoResult};
pub use search::index::PasswordIndex;
pub use search::query::{QueryValidationError, SearchQuery, DEFAULT_MAX_FREE_TEXT_CHARS};
pub use service::search_service::{SearchService, ServiceError};
pub use tag_store::TagStore;
pub use vault::audit::{AuditError, AuditSink, DisclosureEvent, LogAuditSink, SqliteAuditSink};
pub use vault::secret_vault::{LookupOutcome, RevealOutcome, SecretVault, VaultError, Withheld};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
