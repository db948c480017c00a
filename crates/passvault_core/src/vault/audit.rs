//! Disclosure audit side channel.

use crate::model::password::PasswordId;
use crate::model::principal::PrincipalId;
use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// One successful secret disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureEvent {
    pub principal_id: PrincipalId,
    pub password_id: PasswordId,
    pub secret_version: u32,
    /// Unix epoch milliseconds.
    pub disclosed_at_ms: i64,
}

impl DisclosureEvent {
    pub fn now(principal_id: PrincipalId, password_id: PasswordId, secret_version: u32) -> Self {
        Self {
            principal_id,
            password_id,
            secret_version,
            disclosed_at_ms: now_epoch_ms(),
        }
    }
}

/// Consumer of disclosure events.
pub trait AuditSink {
    fn record_disclosure(&self, event: &DisclosureEvent) -> Result<(), AuditError>;
}

#[derive(Debug)]
pub enum AuditError {
    Sqlite(rusqlite::Error),
    Rejected(String),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "audit write failed: {err}"),
            Self::Rejected(message) => write!(f, "audit sink rejected event: {message}"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Rejected(_) => None,
        }
    }
}

impl From<rusqlite::Error> for AuditError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Writes events to the `disclosure_audit` table.
///
/// When it shares the request connection, the event commits or rolls back
/// together with the request snapshot.
pub struct SqliteAuditSink<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAuditSink<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Disclosures of one record, oldest first.
    pub fn list_disclosures(
        &self,
        password_id: PasswordId,
    ) -> Result<Vec<DisclosureEvent>, AuditError> {
        let mut stmt = self.conn.prepare(
            "SELECT principal_id, password_id, secret_version, disclosed_at
             FROM disclosure_audit
             WHERE password_id = ?1
             ORDER BY disclosed_at ASC, id ASC;",
        )?;
        let events = stmt
            .query_map([password_id], |row| {
                Ok(DisclosureEvent {
                    principal_id: row.get(0)?,
                    password_id: row.get(1)?,
                    secret_version: row.get(2)?,
                    disclosed_at_ms: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

impl AuditSink for SqliteAuditSink<'_> {
    fn record_disclosure(&self, event: &DisclosureEvent) -> Result<(), AuditError> {
        self.conn.execute(
            "INSERT INTO disclosure_audit (
                principal_id,
                password_id,
                secret_version,
                disclosed_at
            ) VALUES (?1, ?2, ?3, ?4);",
            params![
                event.principal_id,
                event.password_id,
                event.secret_version,
                event.disclosed_at_ms
            ],
        )?;
        Ok(())
    }
}

/// Emits events to the process log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record_disclosure(&self, event: &DisclosureEvent) -> Result<(), AuditError> {
        info!(
            "event=secret_disclosed module=audit status=ok principal_id={} password_id={} version={} at_ms={}",
            event.principal_id, event.password_id, event.secret_version, event.disclosed_at_ms
        );
        Ok(())
    }
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
