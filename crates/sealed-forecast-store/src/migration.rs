//! SQLite schema versioning.
//!
//! The schema version lives in `PRAGMA user_version`. `STEPS[i]` upgrades a
//! database from version `i` to `i + 1`; all pending steps run in one
//! transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Ordered upgrade steps.
const STEPS: &[&str] = &[
    // 0 -> 1: ledger, owner records, reader sets.
    r#"
    CREATE TABLE ledger_entries (
        seq INTEGER PRIMARY KEY,
        tx_id BLOB NOT NULL UNIQUE,
        prev_tx_id BLOB,
        caller BLOB NOT NULL,
        kind INTEGER NOT NULL,
        tx_bytes BLOB NOT NULL,
        committed_at INTEGER NOT NULL
    );

    CREATE TABLE owner_records (
        owner BLOB PRIMARY KEY,
        handle BLOB NOT NULL,
        updated_at_seq INTEGER NOT NULL
    );

    CREATE TABLE authorized_readers (
        owner BLOB NOT NULL,
        reader BLOB NOT NULL,
        granted_at_seq INTEGER NOT NULL,
        PRIMARY KEY (owner, reader)
    );

    CREATE INDEX idx_owner_records_handle ON owner_records(handle);
    CREATE INDEX idx_ledger_entries_caller ON ledger_entries(caller);
    "#,
];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = STEPS.len() as u32;

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Bring `conn` up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found = schema_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "schema v{found} was written by a newer build (this one knows v{CURRENT_VERSION})"
        )));
    }
    if found == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (index, sql) in STEPS.iter().enumerate().skip(found as usize) {
        tx.execute_batch(sql)?;
        tracing::debug!(to = index + 1, "upgraded sqlite schema");
    }
    tx.pragma_update(None, "user_version", CURRENT_VERSION)?;
    tx.commit()?;
    Ok(())
}
