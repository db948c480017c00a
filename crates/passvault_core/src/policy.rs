//! Access policy over per-request grant snapshots.
//!
//! # Responsibility
//! - Decide whether a principal may list or reveal one record.
//! - Keep the decision a pure function of grant data loaded for the
//!   current request.
//!
//! # Invariants
//! - `check(.., Reveal)` is true only when `check(.., List)` is true.
//! - A policy built for one principal denies every other principal.
//! - Nothing here is cached beyond the owning request.

use crate::model::grant::{AccessGrant, Action, Permissions};
use crate::model::password::{PasswordId, PasswordRecord};
use crate::model::principal::{Principal, PrincipalId};
use crate::repo::grant_repo::GrantRepository;
use crate::repo::RepoResult;
use std::collections::{BTreeMap, BTreeSet};

/// Why a request was refused. Only ever written to logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No grant reaches the record through the principal or its groups.
    MissingGrant,
    /// A grant exists but does not include the action.
    ActionNotGranted,
    /// The record is disabled and secrets of disabled records stay sealed.
    RecordDisabled,
    /// The policy was loaded for a different principal.
    PrincipalMismatch,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingGrant => "missing_grant",
            Self::ActionNotGranted => "action_not_granted",
            Self::RecordDisabled => "record_disabled",
            Self::PrincipalMismatch => "principal_mismatch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Effective permissions of one principal, built for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    principal_id: PrincipalId,
    effective: BTreeMap<PasswordId, Permissions>,
}

impl AccessPolicy {
    /// Builds the policy from raw grant rows.
    ///
    /// Rows whose subject is not the principal or one of its groups are
    /// ignored, so a sloppy loader can never widen access.
    pub fn from_grants(
        principal: &Principal,
        grants: impl IntoIterator<Item = AccessGrant>,
    ) -> Self {
        let subjects = principal.subjects().collect::<BTreeSet<_>>();
        let mut effective: BTreeMap<PasswordId, Permissions> = BTreeMap::new();
        for grant in grants {
            if !subjects.contains(&grant.subject) {
                continue;
            }
            let slot = effective.entry(grant.password_id).or_default();
            *slot = slot.union(grant.permissions);
        }

        Self {
            principal_id: principal.id,
            effective,
        }
    }

    /// Loads every grant the principal holds, for list-style requests.
    pub fn load(repo: &impl GrantRepository, principal: &Principal) -> RepoResult<Self> {
        let subjects = principal.subjects().collect::<Vec<_>>();
        let grants = repo.grants_for_subjects(&subjects, None)?;
        Ok(Self::from_grants(principal, grants))
    }

    /// Loads only the grants touching one record, for single-record requests.
    pub fn load_for_password(
        repo: &impl GrantRepository,
        principal: &Principal,
        password_id: PasswordId,
    ) -> RepoResult<Self> {
        let subjects = principal.subjects().collect::<Vec<_>>();
        let grants = repo.grants_for_subjects(&subjects, Some(password_id))?;
        Ok(Self::from_grants(principal, grants))
    }

    /// Full decision including the internal reason.
    pub fn evaluate(
        &self,
        principal: &Principal,
        record: &PasswordRecord,
        action: Action,
    ) -> Decision {
        if principal.id != self.principal_id {
            return Decision::Deny(DenyReason::PrincipalMismatch);
        }

        let Some(permissions) = self.effective.get(&record.id).copied() else {
            return Decision::Deny(DenyReason::MissingGrant);
        };

        if !permissions.allows(action) {
            return Decision::Deny(DenyReason::ActionNotGranted);
        }

        if action == Action::Reveal && !record.active {
            return Decision::Deny(DenyReason::RecordDisabled);
        }

        Decision::Allow
    }

    /// Boolean form used before every metadata emission and disclosure.
    pub fn check(&self, principal: &Principal, record: &PasswordRecord, action: Action) -> bool {
        self.evaluate(principal, record, action).is_allowed()
    }
}
