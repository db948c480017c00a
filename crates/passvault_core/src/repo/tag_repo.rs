//! Tag taxonomy repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own canonical tag rows (create, rename, lookup).
//!
//! # Invariants
//! - Tag names are unique ignoring case.
//! - Listing order is `name COLLATE NOCASE ASC, id ASC`.

use crate::db::ensure_schema_ready;
use crate::model::tag::{normalize_tag_name, Tag, TagId};
use crate::repo::{is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for the tag taxonomy.
pub trait TagRepository {
    /// Creates one tag after name normalization.
    fn create_tag(&self, name: &str) -> RepoResult<Tag>;
    /// Renames one tag; identity is preserved.
    fn rename_tag(&self, id: TagId, name: &str) -> RepoResult<Tag>;
    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>>;
    /// Returns every tag regardless of attachment or visibility.
    fn list_all_tags(&self) -> RepoResult<Vec<Tag>>;
}

/// SQLite-backed tag repository.
pub struct SqliteTagRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTagRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TagRepository for SqliteTagRepository<'_> {
    fn create_tag(&self, name: &str) -> RepoResult<Tag> {
        let name = normalize_tag_name(name)?;
        match self
            .conn
            .execute("INSERT INTO tags (name) VALUES (?1);", [name.as_str()])
        {
            Ok(_) => Ok(Tag {
                id: self.conn.last_insert_rowid(),
                name,
            }),
            Err(err) if is_unique_violation(&err) => Err(RepoError::DuplicateTagName(name)),
            Err(err) => Err(err.into()),
        }
    }

    fn rename_tag(&self, id: TagId, name: &str) -> RepoResult<Tag> {
        let name = normalize_tag_name(name)?;
        let changed = match self.conn.execute(
            "UPDATE tags SET name = ?2 WHERE id = ?1;",
            params![id, name.as_str()],
        ) {
            Ok(changed) => changed,
            Err(err) if is_unique_violation(&err) => {
                return Err(RepoError::DuplicateTagName(name));
            }
            Err(err) => return Err(err.into()),
        };

        if changed == 0 {
            return Err(RepoError::TagNotFound(id));
        }

        Ok(Tag { id, name })
    }

    fn get_tag(&self, id: TagId) -> RepoResult<Option<Tag>> {
        let tag = self
            .conn
            .query_row("SELECT id, name FROM tags WHERE id = ?1;", [id], parse_tag_row)
            .optional()?;
        Ok(tag)
    }

    fn list_all_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM tags ORDER BY name COLLATE NOCASE ASC, id ASC;")?;
        let tags = stmt
            .query_map([], parse_tag_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

fn parse_tag_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}
