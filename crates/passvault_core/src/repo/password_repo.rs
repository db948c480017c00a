//! Password metadata repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist record metadata and tag attachments.
//! - Serve candidate rows for search with the storage-friendly filters
//!   (active flag, tag conjunction) already applied.
//!
//! # Invariants
//! - Tag attachments only reference existing tags.
//! - Tag sets are replaced as a whole inside one immediate transaction.
//! - Secret values are never selected here.

use crate::db::ensure_schema_ready;
use crate::model::password::{PasswordDraft, PasswordId, PasswordRecord};
use crate::model::tag::{sort_tags, Tag, TagId};
use crate::repo::{bool_to_int, parse_bool, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, BTreeSet};

const PASSWORD_SELECT_SQL: &str = "SELECT
    id,
    title,
    username,
    notes,
    is_active
FROM passwords";

const ATTACHMENT_BATCH_SIZE: usize = 500;

/// Storage-level prefilter for record listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Skip records whose `active` flag is off.
    pub active_only: bool,
    /// Keep only records carrying every listed tag.
    pub tag_ids: BTreeSet<TagId>,
}

impl RecordFilter {
    /// Every stored record.
    pub fn all() -> Self {
        Self::default()
    }
}

/// Repository interface for password metadata.
pub trait PasswordRepository {
    fn create_password(&self, draft: &PasswordDraft) -> RepoResult<PasswordId>;
    /// Replaces title, username and notes.
    fn update_password(&self, id: PasswordId, draft: &PasswordDraft) -> RepoResult<()>;
    /// Enables or disables a record.
    fn set_active(&self, id: PasswordId, active: bool) -> RepoResult<()>;
    /// Replaces all tags for the record in one transaction.
    fn set_password_tags(&self, id: PasswordId, tag_ids: &[TagId]) -> RepoResult<()>;
    fn get_password(&self, id: PasswordId) -> RepoResult<Option<PasswordRecord>>;
    /// Lists records matching `filter`, ordered by `title ASC, id ASC`.
    fn list_passwords(&self, filter: &RecordFilter) -> RepoResult<Vec<PasswordRecord>>;
}

/// SQLite-backed password metadata repository.
pub struct SqlitePasswordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePasswordRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PasswordRepository for SqlitePasswordRepository<'_> {
    fn create_password(&self, draft: &PasswordDraft) -> RepoResult<PasswordId> {
        let draft = draft.validated()?;
        self.conn.execute(
            "INSERT INTO passwords (title, username, notes, is_active)
             VALUES (?1, ?2, ?3, 1);",
            params![
                draft.title.as_str(),
                draft.username.as_str(),
                draft.notes.as_str()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_password(&self, id: PasswordId, draft: &PasswordDraft) -> RepoResult<()> {
        let draft = draft.validated()?;
        let changed = self.conn.execute(
            "UPDATE passwords
             SET
                title = ?2,
                username = ?3,
                notes = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                draft.title.as_str(),
                draft.username.as_str(),
                draft.notes.as_str()
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::PasswordNotFound(id));
        }
        Ok(())
    }

    fn set_active(&self, id: PasswordId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE passwords
             SET
                is_active = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, bool_to_int(active)],
        )?;

        if changed == 0 {
            return Err(RepoError::PasswordNotFound(id));
        }
        Ok(())
    }

    fn set_password_tags(&self, id: PasswordId, tag_ids: &[TagId]) -> RepoResult<()> {
        let unique = tag_ids.iter().copied().collect::<BTreeSet<_>>();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM passwords WHERE id = ?1);", id)? {
            return Err(RepoError::PasswordNotFound(id));
        }
        for tag_id in &unique {
            if !row_exists(&tx, "SELECT EXISTS(SELECT 1 FROM tags WHERE id = ?1);", *tag_id)? {
                return Err(RepoError::TagNotFound(*tag_id));
            }
        }

        tx.execute("DELETE FROM password_tags WHERE password_id = ?1;", [id])?;
        for tag_id in &unique {
            tx.execute(
                "INSERT INTO password_tags (password_id, tag_id) VALUES (?1, ?2);",
                params![id, tag_id],
            )?;
        }
        tx.execute(
            "UPDATE passwords
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            [id],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn get_password(&self, id: PasswordId) -> RepoResult<Option<PasswordRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PASSWORD_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let mut record = parse_password_row(row)?;
        record.tags = load_tags_for_password(self.conn, id)?;
        Ok(Some(record))
    }

    fn list_passwords(&self, filter: &RecordFilter) -> RepoResult<Vec<PasswordRecord>> {
        let mut sql = format!("{PASSWORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if filter.active_only {
            sql.push_str(" AND is_active = 1");
        }

        if !filter.tag_ids.is_empty() {
            let placeholders = vec!["?"; filter.tag_ids.len()].join(", ");
            sql.push_str(&format!(
                " AND id IN (
                    SELECT password_id
                    FROM password_tags
                    WHERE tag_id IN ({placeholders})
                    GROUP BY password_id
                    HAVING COUNT(DISTINCT tag_id) = ?
                )"
            ));
            bind_values.extend(filter.tag_ids.iter().map(|id| Value::Integer(*id)));
            bind_values.push(Value::Integer(filter.tag_ids.len() as i64));
        }

        sql.push_str(" ORDER BY title ASC, id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_password_row(row)?);
        }

        if records.is_empty() {
            return Ok(records);
        }

        let ids = records.iter().map(|record| record.id).collect::<Vec<_>>();
        let mut tags_by_password = load_attachments(self.conn, &ids)?;
        for record in &mut records {
            record.tags = tags_by_password.remove(&record.id).unwrap_or_default();
        }
        Ok(records)
    }
}

fn parse_password_row(row: &Row<'_>) -> RepoResult<PasswordRecord> {
    let active = parse_bool(row.get("is_active")?, "passwords.is_active")?;
    let title: String = row.get("title")?;
    if title.trim().is_empty() {
        return Err(RepoError::InvalidData(
            "empty title in passwords.title".to_string(),
        ));
    }

    Ok(PasswordRecord {
        id: row.get("id")?,
        title,
        username: row.get("username")?,
        notes: row.get("notes")?,
        tags: Vec::new(),
        active,
    })
}

fn load_tags_for_password(conn: &Connection, id: PasswordId) -> RepoResult<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name
         FROM password_tags pt
         INNER JOIN tags t ON t.id = pt.tag_id
         WHERE pt.password_id = ?1;",
    )?;
    let mut tags = stmt
        .query_map([id], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    sort_tags(&mut tags);
    Ok(tags)
}

/// Tags of the given records only, queried in bounded batches.
fn load_attachments(
    conn: &Connection,
    ids: &[PasswordId],
) -> RepoResult<BTreeMap<PasswordId, Vec<Tag>>> {
    let mut grouped: BTreeMap<PasswordId, Vec<Tag>> = BTreeMap::new();
    for chunk in ids.chunks(ATTACHMENT_BATCH_SIZE) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT pt.password_id, t.id, t.name
             FROM password_tags pt
             INNER JOIN tags t ON t.id = pt.tag_id
             WHERE pt.password_id IN ({placeholders});"
        ))?;
        let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
        while let Some(row) = rows.next()? {
            grouped.entry(row.get(0)?).or_default().push(Tag {
                id: row.get(1)?,
                name: row.get(2)?,
            });
        }
    }

    for tags in grouped.values_mut() {
        sort_tags(tags);
    }
    Ok(grouped)
}

fn row_exists(tx: &Transaction<'_>, sql: &str, id: i64) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(sql, [id], |row| row.get(0))?;
    Ok(exists == 1)
}
