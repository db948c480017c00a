//! Per-request snapshots.
//!
//! # Invariants
//! - Every read issued through one snapshot observes the same committed state.
//! - Read snapshots never write.
//! - Write snapshots hold the reserved lock from `BEGIN`, so a request that
//!   reads first and writes later never needs a lock upgrade.
//! - Dropping a snapshot without `finish` rolls everything back.

use super::DbResult;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::ops::Deref;

/// Transaction scoped to a single request.
pub struct RequestSnapshot<'conn> {
    tx: Transaction<'conn>,
}

/// Starts a deferred read snapshot on a shared connection handle.
///
/// Fails if the connection already has an open transaction.
pub fn read_snapshot(conn: &Connection) -> DbResult<RequestSnapshot<'_>> {
    begin(conn, TransactionBehavior::Deferred)
}

/// Starts an immediate snapshot for requests that write before they end.
///
/// Waiting for other writers is bounded by the connection busy timeout.
pub fn write_snapshot(conn: &Connection) -> DbResult<RequestSnapshot<'_>> {
    begin(conn, TransactionBehavior::Immediate)
}

fn begin(conn: &Connection, behavior: TransactionBehavior) -> DbResult<RequestSnapshot<'_>> {
    let tx = Transaction::new_unchecked(conn, behavior)?;
    Ok(RequestSnapshot { tx })
}

impl RequestSnapshot<'_> {
    /// Commits the snapshot and releases its lock.
    pub fn finish(self) -> DbResult<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl Deref for RequestSnapshot<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}
