//! Access grant repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist grants per (subject, password) pair.
//! - Load the grant rows relevant to one principal for one request.
//!
//! # Invariants
//! - At most one grant per (password, subject); writes upsert.
//! - Persisted rows with reveal-without-list are reported as invalid data.

use crate::db::ensure_schema_ready;
use crate::model::grant::{AccessGrant, Permissions};
use crate::model::password::PasswordId;
use crate::model::principal::Subject;
use crate::repo::{bool_to_int, parse_bool, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

pub trait GrantRepository {
    /// Inserts or replaces the grant for `(grant.password_id, grant.subject)`.
    fn put_grant(&self, grant: &AccessGrant) -> RepoResult<()>;
    /// Removes a grant; returns whether one existed.
    fn revoke_grant(&self, password_id: PasswordId, subject: Subject) -> RepoResult<bool>;
    /// All grants held by any of `subjects`, optionally for one password only.
    fn grants_for_subjects(
        &self,
        subjects: &[Subject],
        password_id: Option<PasswordId>,
    ) -> RepoResult<Vec<AccessGrant>>;
}

pub struct SqliteGrantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGrantRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GrantRepository for SqliteGrantRepository<'_> {
    fn put_grant(&self, grant: &AccessGrant) -> RepoResult<()> {
        let permissions = Permissions::try_new(
            grant.permissions.can_list,
            grant.permissions.can_reveal,
        )?;
        let result = self.conn.execute(
            "INSERT INTO access_grants (
                password_id,
                subject_kind,
                subject_id,
                can_list,
                can_reveal
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (password_id, subject_kind, subject_id) DO UPDATE SET
                can_list = excluded.can_list,
                can_reveal = excluded.can_reveal;",
            params![
                grant.password_id,
                grant.subject.kind_to_db(),
                grant.subject.id(),
                bool_to_int(permissions.can_list),
                bool_to_int(permissions.can_reveal),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(code, _))
                if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Err(RepoError::PasswordNotFound(grant.password_id))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn revoke_grant(&self, password_id: PasswordId, subject: Subject) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM access_grants
             WHERE password_id = ?1
               AND subject_kind = ?2
               AND subject_id = ?3;",
            params![password_id, subject.kind_to_db(), subject.id()],
        )?;
        Ok(changed > 0)
    }

    fn grants_for_subjects(
        &self,
        subjects: &[Subject],
        password_id: Option<PasswordId>,
    ) -> RepoResult<Vec<AccessGrant>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let mut bind_values: Vec<Value> = Vec::new();
        let subject_clauses = subjects
            .iter()
            .map(|subject| {
                bind_values.push(Value::Text(subject.kind_to_db().to_string()));
                bind_values.push(Value::Integer(subject.id()));
                "(subject_kind = ? AND subject_id = ?)"
            })
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut sql = format!(
            "SELECT password_id, subject_kind, subject_id, can_list, can_reveal
             FROM access_grants
             WHERE ({subject_clauses})"
        );
        if let Some(password_id) = password_id {
            sql.push_str(" AND password_id = ?");
            bind_values.push(Value::Integer(password_id));
        }
        sql.push_str(" ORDER BY password_id ASC, subject_kind ASC, subject_id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut grants = Vec::new();
        while let Some(row) = rows.next()? {
            grants.push(parse_grant_row(row)?);
        }
        Ok(grants)
    }
}

fn parse_grant_row(row: &Row<'_>) -> RepoResult<AccessGrant> {
    let kind: String = row.get("subject_kind")?;
    let subject_id: i64 = row.get("subject_id")?;
    let subject = Subject::from_db(&kind, subject_id).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid subject kind `{kind}` in access_grants.subject_kind"
        ))
    })?;

    let can_list = parse_bool(row.get("can_list")?, "access_grants.can_list")?;
    let can_reveal = parse_bool(row.get("can_reveal")?, "access_grants.can_reveal")?;
    let permissions = Permissions::try_new(can_list, can_reveal).map_err(|err| {
        RepoError::InvalidData(format!("{err} in access_grants"))
    })?;

    Ok(AccessGrant::new(row.get("password_id")?, subject, permissions))
}
