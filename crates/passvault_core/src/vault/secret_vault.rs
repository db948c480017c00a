//! Policy-gated secret and metadata access for single records.

use crate::model::grant::Action;
use crate::model::password::{PasswordId, PasswordRecord, SecretValue};
use crate::model::principal::Principal;
use crate::policy::{AccessPolicy, Decision, DenyReason};
use crate::repo::grant_repo::GrantRepository;
use crate::repo::password_repo::PasswordRepository;
use crate::repo::secret_repo::SecretRepository;
use crate::repo::{RepoError, RepoResult};
use crate::vault::audit::{AuditError, AuditSink, DisclosureEvent};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why nothing was returned. Callers outside the core must collapse both
/// variants into one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Withheld {
    NotFound,
    Denied(DenyReason),
}

impl Withheld {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Denied(reason) => reason.as_str(),
        }
    }
}

#[derive(Debug)]
pub enum RevealOutcome {
    Disclosed(SecretValue),
    Withheld(Withheld),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(PasswordRecord),
    Withheld(Withheld),
}

/// Storage or audit failure; never an authorization result.
#[derive(Debug)]
pub enum VaultError {
    Repo(RepoError),
    Audit(AuditError),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Audit(err) => write!(f, "{err}"),
        }
    }
}

impl Error for VaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Audit(err) => Some(err),
        }
    }
}

impl From<RepoError> for VaultError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AuditError> for VaultError {
    fn from(value: AuditError) -> Self {
        Self::Audit(value)
    }
}

pub struct SecretVault<'a, P, S, G>
where
    P: PasswordRepository,
    S: SecretRepository,
    G: GrantRepository,
{
    passwords: P,
    secrets: S,
    grants: G,
    audit: &'a dyn AuditSink,
}

impl<'a, P, S, G> SecretVault<'a, P, S, G>
where
    P: PasswordRepository,
    S: SecretRepository,
    G: GrantRepository,
{
    pub fn new(passwords: P, secrets: S, grants: G, audit: &'a dyn AuditSink) -> Self {
        Self {
            passwords,
            secrets,
            grants,
            audit,
        }
    }

    /// Returns the current secret of `id` if `principal` may reveal it.
    ///
    /// Grants are loaded fresh on every call. A record without any stored
    /// secret is reported as not found.
    pub fn reveal(
        &self,
        principal: &Principal,
        id: PasswordId,
    ) -> Result<RevealOutcome, VaultError> {
        let record = match self.authorize(principal, id, Action::Reveal)? {
            LookupOutcome::Found(record) => record,
            LookupOutcome::Withheld(withheld) => return Ok(RevealOutcome::Withheld(withheld)),
        };

        let Some(secret) = self.secrets.current_secret(record.id)? else {
            warn!(
                "event=secret_reveal module=vault status=withheld principal_id={} password_id={} reason=no_secret",
                principal.id, id
            );
            return Ok(RevealOutcome::Withheld(Withheld::NotFound));
        };

        let event = DisclosureEvent::now(principal.id, record.id, secret.version());
        self.audit.record_disclosure(&event)?;
        info!(
            "event=secret_reveal module=vault status=ok principal_id={} password_id={} version={}",
            principal.id,
            id,
            secret.version()
        );
        Ok(RevealOutcome::Disclosed(secret))
    }

    /// Returns record metadata if `principal` may list it.
    pub fn get_metadata(
        &self,
        principal: &Principal,
        id: PasswordId,
    ) -> Result<LookupOutcome, VaultError> {
        Ok(self.authorize(principal, id, Action::List)?)
    }

    /// Stores a new secret version for `id`.
    pub fn store_secret(&self, id: PasswordId, value: &str) -> RepoResult<u32> {
        let version = self.secrets.store_secret(id, value)?;
        info!(
            "event=secret_store module=vault status=ok password_id={} version={}",
            id, version
        );
        Ok(version)
    }

    /// Number of stored versions for `id`.
    pub fn secret_history_len(&self, id: PasswordId) -> RepoResult<u32> {
        self.secrets.secret_version_count(id)
    }

    fn authorize(
        &self,
        principal: &Principal,
        id: PasswordId,
        action: Action,
    ) -> RepoResult<LookupOutcome> {
        let Some(record) = self.passwords.get_password(id)? else {
            warn!(
                "event=record_access module=vault status=withheld principal_id={} password_id={} action={} reason=not_found",
                principal.id,
                id,
                action.as_str()
            );
            return Ok(LookupOutcome::Withheld(Withheld::NotFound));
        };

        let policy = AccessPolicy::load_for_password(&self.grants, principal, id)?;
        match policy.evaluate(principal, &record, action) {
            Decision::Allow => Ok(LookupOutcome::Found(record)),
            Decision::Deny(reason) => {
                warn!(
                    "event=record_access module=vault status=withheld principal_id={} password_id={} action={} reason={}",
                    principal.id,
                    id,
                    action.as_str(),
                    reason.as_str()
                );
                Ok(LookupOutcome::Withheld(Withheld::Denied(reason)))
            }
        }
    }
}
