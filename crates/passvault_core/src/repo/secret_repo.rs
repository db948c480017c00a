//! Versioned secret storage keyed by password id.
//!
//! # Invariants
//! - Versions start at 1 and grow by one per stored value.
//! - The current secret is the highest version.
//! - Values are only materialized as [`SecretValue`].

use crate::db::ensure_schema_ready;
use crate::model::password::{PasswordId, PasswordValidationError, SecretValue};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

pub trait SecretRepository {
    /// Appends a new secret version and returns its number.
    fn store_secret(&self, id: PasswordId, value: &str) -> RepoResult<u32>;
    fn current_secret(&self, id: PasswordId) -> RepoResult<Option<SecretValue>>;
    /// Number of stored versions (history length).
    fn secret_version_count(&self, id: PasswordId) -> RepoResult<u32>;
}

pub struct SqliteSecretRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSecretRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SecretRepository for SqliteSecretRepository<'_> {
    fn store_secret(&self, id: PasswordId, value: &str) -> RepoResult<u32> {
        if value.trim().is_empty() {
            return Err(PasswordValidationError::EmptySecret.into());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM passwords WHERE id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::PasswordNotFound(id));
        }

        let version: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM password_secrets WHERE password_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO password_secrets (password_id, version, value) VALUES (?1, ?2, ?3);",
            params![id, version, value],
        )?;
        tx.commit()?;

        Ok(version)
    }

    fn current_secret(&self, id: PasswordId) -> RepoResult<Option<SecretValue>> {
        let secret = self
            .conn
            .query_row(
                "SELECT version, value
                 FROM password_secrets
                 WHERE password_id = ?1
                 ORDER BY version DESC
                 LIMIT 1;",
                [id],
                |row| Ok(SecretValue::new(row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(secret)
    }

    fn secret_version_count(&self, id: PasswordId) -> RepoResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM password_secrets WHERE password_id = ?1;",
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
