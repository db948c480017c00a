//! Principal, group and session lookup.
//!
//! Authentication itself happens elsewhere; this store only maps issued
//! session tokens back to principals and their group memberships.

use crate::db::ensure_schema_ready;
use crate::model::principal::{GroupId, Principal, PrincipalId};
use crate::repo::{is_unique_violation, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub trait PrincipalRepository {
    fn create_principal(&self, name: &str) -> RepoResult<Principal>;
    fn create_group(&self, name: &str) -> RepoResult<GroupId>;
    fn add_member(&self, group_id: GroupId, principal_id: PrincipalId) -> RepoResult<()>;
    fn get_principal(&self, id: PrincipalId) -> RepoResult<Option<Principal>>;
    /// Stores a fresh opaque token for `principal_id` and returns it.
    fn issue_session(&self, principal_id: PrincipalId) -> RepoResult<String>;
    fn resolve_session(&self, token: &str) -> RepoResult<Option<Principal>>;
    fn revoke_session(&self, token: &str) -> RepoResult<bool>;
}

pub struct SqlitePrincipalRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePrincipalRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn insert_named(&self, sql: &str, kind: &'static str, name: &str) -> RepoResult<i64> {
        if name.is_empty() {
            return Err(RepoError::EmptyName(kind));
        }
        match self.conn.execute(sql, [name]) {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => {
                Err(RepoError::DuplicateName(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl PrincipalRepository for SqlitePrincipalRepository<'_> {
    fn create_principal(&self, name: &str) -> RepoResult<Principal> {
        let name = name.trim();
        let id =
            self.insert_named("INSERT INTO principals (name) VALUES (?1);", "principal", name)?;
        Ok(Principal::new(id, name))
    }

    fn create_group(&self, name: &str) -> RepoResult<GroupId> {
        self.insert_named(
            "INSERT INTO principal_groups (name) VALUES (?1);",
            "group",
            name.trim(),
        )
    }

    fn add_member(&self, group_id: GroupId, principal_id: PrincipalId) -> RepoResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, principal_id) VALUES (?1, ?2);",
            params![group_id, principal_id],
        )?;
        Ok(())
    }

    fn get_principal(&self, id: PrincipalId) -> RepoResult<Option<Principal>> {
        let name: Option<String> = self
            .conn
            .query_row("SELECT name FROM principals WHERE id = ?1;", [id], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(name) = name else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT group_id FROM group_members WHERE principal_id = ?1 ORDER BY group_id;",
        )?;
        let groups = stmt
            .query_map([id], |row| row.get::<_, GroupId>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Principal::new(id, name).with_groups(groups)))
    }

    fn issue_session(&self, principal_id: PrincipalId) -> RepoResult<String> {
        if self.get_principal(principal_id)?.is_none() {
            return Err(RepoError::PrincipalNotFound(principal_id));
        }

        let token = Uuid::new_v4().simple().to_string();
        self.conn.execute(
            "INSERT INTO sessions (token, principal_id) VALUES (?1, ?2);",
            params![token.as_str(), principal_id],
        )?;
        Ok(token)
    }

    fn resolve_session(&self, token: &str) -> RepoResult<Option<Principal>> {
        let principal_id: Option<PrincipalId> = self
            .conn
            .query_row(
                "SELECT principal_id FROM sessions WHERE token = ?1;",
                [token],
                |row| row.get(0),
            )
            .optional()?;

        match principal_id {
            Some(id) => self.get_principal(id),
            None => Ok(None),
        }
    }

    fn revoke_session(&self, token: &str) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(changed > 0)
    }
}
