//! Password index: filtered, access-scoped metadata search.
//!
//! # Invariants
//! - Filter order: active flag, tag conjunction, free text, `List` policy.
//! - Output order is title ignoring case, then raw title, then id, matching
//!   how tags are listed.
//! - An empty result is a normal outcome.

use crate::model::grant::Action;
use crate::model::password::PasswordRecord;
use crate::model::principal::Principal;
use crate::policy::AccessPolicy;
use crate::repo::password_repo::{PasswordRepository, RecordFilter};
use crate::repo::RepoResult;
use crate::search::query::SearchQuery;
use log::debug;

pub struct PasswordIndex<R: PasswordRepository> {
    repo: R,
}

impl<R: PasswordRepository> PasswordIndex<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Runs `query` for `principal`.
    ///
    /// Active and tag filters run in storage; text and policy run here so
    /// the text match is Unicode case-insensitive.
    pub fn search(
        &self,
        principal: &Principal,
        policy: &AccessPolicy,
        query: &SearchQuery,
    ) -> RepoResult<Vec<PasswordRecord>> {
        let filter = RecordFilter {
            active_only: query.active_only,
            tag_ids: query.tag_ids.clone(),
        };
        let candidates = self.repo.list_passwords(&filter)?;
        let candidate_count = candidates.len();
        let needle = query.normalized_text();

        let mut hits = candidates
            .into_iter()
            .filter(|record| !query.active_only || record.active)
            .filter(|record| record.has_all_tags(&query.tag_ids))
            .filter(|record| {
                needle
                    .as_deref()
                    .map_or(true, |needle| record.matches_text(needle))
            })
            .filter(|record| policy.check(principal, record, Action::List))
            .collect::<Vec<_>>();
        sort_by_title(&mut hits);

        debug!(
            "event=index_search module=search status=ok principal_id={} candidates={} hits={}",
            principal.id,
            candidate_count,
            hits.len()
        );
        Ok(hits)
    }

    /// Every record the principal may list, unfiltered.
    pub fn listable(
        &self,
        principal: &Principal,
        policy: &AccessPolicy,
    ) -> RepoResult<Vec<PasswordRecord>> {
        let records = self.repo.list_passwords(&RecordFilter::all())?;
        Ok(records
            .into_iter()
            .filter(|record| policy.check(principal, record, Action::List))
            .collect())
    }
}

fn sort_by_title(records: &mut [PasswordRecord]) {
    records.sort_by_cached_key(|record| {
        (record.title.to_lowercase(), record.title.clone(), record.id)
    });
}
