//! Tag taxonomy as seen by search.
//!
//! # Responsibility
//! - Answer "which tags may this principal filter by".
//! - Front taxonomy administration (create, rename).
//!
//! # Invariants
//! - A tag is visible only when attached to a record the principal can list.
//! - Visible tags are ordered by name ignoring case, then id.

use crate::model::principal::Principal;
use crate::model::tag::{sort_tags, Tag, TagId};
use crate::policy::AccessPolicy;
use crate::repo::password_repo::PasswordRepository;
use crate::repo::tag_repo::TagRepository;
use crate::repo::RepoResult;
use crate::search::index::PasswordIndex;
use log::info;
use std::collections::BTreeMap;

pub struct TagStore<T: TagRepository, P: PasswordRepository> {
    tags: T,
    index: PasswordIndex<P>,
}

impl<T: TagRepository, P: PasswordRepository> TagStore<T, P> {
    pub fn new(tags: T, passwords: P) -> Self {
        Self {
            tags,
            index: PasswordIndex::new(passwords),
        }
    }

    /// Tags attached to at least one record `principal` can list.
    pub fn list_tags(&self, principal: &Principal, policy: &AccessPolicy) -> RepoResult<Vec<Tag>> {
        let mut visible: BTreeMap<TagId, Tag> = BTreeMap::new();
        for record in self.index.listable(principal, policy)? {
            for tag in record.tags {
                visible.entry(tag.id).or_insert(tag);
            }
        }

        let mut tags = visible.into_values().collect::<Vec<_>>();
        sort_tags(&mut tags);
        Ok(tags)
    }

    /// Whole taxonomy, for administration screens.
    pub fn list_all_tags(&self) -> RepoResult<Vec<Tag>> {
        self.tags.list_all_tags()
    }

    pub fn create_tag(&self, name: &str) -> RepoResult<Tag> {
        let tag = self.tags.create_tag(name)?;
        info!("event=tag_create module=tag_store status=ok tag_id={}", tag.id);
        Ok(tag)
    }

    /// Renames a tag. Records keep referencing it by id.
    pub fn rename_tag(&self, id: TagId, name: &str) -> RepoResult<Tag> {
        let tag = self.tags.rename_tag(id, name)?;
        info!("event=tag_rename module=tag_store status=ok tag_id={}", tag.id);
        Ok(tag)
    }
}
