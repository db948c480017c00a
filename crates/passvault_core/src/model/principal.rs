//! Request principals and grant subjects.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stable identifier of an authenticated principal.
pub type PrincipalId = i64;

/// Stable identifier of a principal group.
pub type GroupId = i64;

/// Authenticated actor issuing a request.
///
/// Built once per request from the session store and never mutated by core
/// logic afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    /// Groups whose grants this principal inherits.
    pub groups: BTreeSet<GroupId>,
}

impl Principal {
    pub fn new(id: PrincipalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            groups: BTreeSet::new(),
        }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.groups.extend(groups);
        self
    }

    /// Every subject a grant may be attached to on behalf of this principal.
    pub fn subjects(&self) -> impl Iterator<Item = Subject> + '_ {
        std::iter::once(Subject::Principal(self.id))
            .chain(self.groups.iter().copied().map(Subject::Group))
    }
}

/// Holder of an access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Subject {
    Principal(PrincipalId),
    Group(GroupId),
}

impl Subject {
    pub(crate) fn kind_to_db(self) -> &'static str {
        match self {
            Self::Principal(_) => "principal",
            Self::Group(_) => "group",
        }
    }

    pub(crate) fn id(self) -> i64 {
        match self {
            Self::Principal(id) | Self::Group(id) => id,
        }
    }

    pub(crate) fn from_db(kind: &str, id: i64) -> Option<Self> {
        match kind {
            "principal" => Some(Self::Principal(id)),
            "group" => Some(Self::Group(id)),
            _ => None,
        }
    }
}
