//! Access grants tying subjects to record permissions.
//!
//! # Invariants
//! - `can_reveal` implies `can_list`; constructors reject anything else.

use crate::model::password::PasswordId;
use crate::model::principal::Subject;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Operation a principal attempts on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// See the record's metadata in lists and detail views.
    List,
    /// Read the record's current secret value.
    Reveal,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Reveal => "reveal",
        }
    }
}

/// Permission pair carried by a grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_list: bool,
    pub can_reveal: bool,
}

impl Permissions {
    pub const NONE: Self = Self {
        can_list: false,
        can_reveal: false,
    };
    pub const LIST: Self = Self {
        can_list: true,
        can_reveal: false,
    };
    pub const LIST_AND_REVEAL: Self = Self {
        can_list: true,
        can_reveal: true,
    };

    pub fn try_new(can_list: bool, can_reveal: bool) -> Result<Self, GrantValidationError> {
        if can_reveal && !can_list {
            return Err(GrantValidationError::RevealWithoutList);
        }
        Ok(Self {
            can_list,
            can_reveal,
        })
    }

    /// Combines two permission sets; the union of valid sets stays valid.
    pub fn union(self, other: Self) -> Self {
        Self {
            can_list: self.can_list || other.can_list,
            can_reveal: self.can_reveal || other.can_reveal,
        }
    }

    pub fn allows(self, action: Action) -> bool {
        match action {
            Action::List => self.can_list,
            Action::Reveal => self.can_list && self.can_reveal,
        }
    }
}

/// One stored grant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub password_id: PasswordId,
    pub subject: Subject,
    pub permissions: Permissions,
}

impl AccessGrant {
    pub fn new(password_id: PasswordId, subject: Subject, permissions: Permissions) -> Self {
        Self {
            password_id,
            subject,
            permissions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantValidationError {
    RevealWithoutList,
}

impl Display for GrantValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RevealWithoutList => write!(f, "reveal permission requires list permission"),
        }
    }
}

impl Error for GrantValidationError {}
