//! SQLite implementation of the LedgerStore trait.
//!
//! This is the persistent backend for a registry. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use sealed_forecast_core::{
    AccountId, CallKind, CiphertextHandle, OwnerRecord, RecordMutation, TxId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{CommitResult, LedgerEntry, LedgerHead, LedgerStore};

/// SQLite-based ledger.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

fn blob32(row: &rusqlite::Row<'_>, idx: usize, name: &str) -> rusqlite::Result<[u8; 32]> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes
        .try_into()
        .map_err(|_| rusqlite::Error::InvalidColumnType(idx, name.into(), Type::Blob))
}

const ENTRY_COLUMNS: &str = "seq, tx_id, prev_tx_id, caller, kind, tx_bytes, committed_at";

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let prev: Option<Vec<u8>> = row.get(2)?;
    let prev_tx_id = prev
        .map(|b| {
            <[u8; 32]>::try_from(b)
                .map(TxId::from_bytes)
                .map_err(|_| rusqlite::Error::InvalidColumnType(2, "prev_tx_id".into(), Type::Blob))
        })
        .transpose()?;

    let kind = CallKind::from_u16(row.get::<_, u16>(4)?)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(4, "kind".into(), Type::Integer))?;

    Ok(LedgerEntry {
        seq: row.get::<_, i64>(0)? as u64,
        tx_id: TxId::from_bytes(blob32(row, 1, "tx_id")?),
        prev_tx_id,
        caller: AccountId::from_bytes(blob32(row, 3, "caller")?),
        kind,
        tx_bytes: Bytes::from(row.get::<_, Vec<u8>>(5)?),
        committed_at: row.get(6)?,
    })
}

fn load_record(conn: &Connection, owner: &AccountId) -> Result<Option<OwnerRecord>> {
    let row = conn
        .query_row(
            "SELECT handle, updated_at_seq FROM owner_records WHERE owner = ?1",
            params![owner.as_bytes().as_slice()],
            |row| Ok((blob32(row, 0, "handle")?, row.get::<_, i64>(1)?)),
        )
        .optional()?;

    let Some((handle, updated_at_seq)) = row else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT reader FROM authorized_readers WHERE owner = ?1 ORDER BY reader",
    )?;
    let readers = stmt
        .query_map(params![owner.as_bytes().as_slice()], |row| {
            blob32(row, 0, "reader").map(AccountId::from_bytes)
        })?
        .collect::<rusqlite::Result<BTreeSet<_>>>()?;

    Ok(Some(OwnerRecord {
        owner: *owner,
        handle: CiphertextHandle::from_bytes(handle),
        readers,
        updated_at_seq: updated_at_seq as u64,
    }))
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    async fn commit(
        &self,
        entry: &LedgerEntry,
        owner: &AccountId,
        mutation: &RecordMutation,
    ) -> Result<CommitResult> {
        let entry = entry.clone();
        let owner = *owner;
        let mutation = mutation.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let existing_seq: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM ledger_entries WHERE tx_id = ?1",
                    params![entry.tx_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(seq) = existing_seq {
                return Ok(CommitResult::AlreadyCommitted { seq: seq as u64 });
            }

            let occupant = tx
                .query_row(
                    "SELECT tx_id FROM ledger_entries WHERE seq = ?1",
                    params![entry.seq as i64],
                    |row| blob32(row, 0, "tx_id"),
                )
                .optional()?;
            if let Some(existing) = occupant {
                return Ok(CommitResult::Conflict {
                    existing: TxId::from_bytes(existing),
                });
            }

            let head: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM ledger_entries",
                [],
                |row| row.get(0),
            )?;
            if entry.seq != head as u64 + 1 {
                return Err(StoreError::NotContiguous {
                    seq: entry.seq,
                    head: head as u64,
                });
            }

            let mut record = load_record(&tx, &owner)?.unwrap_or_else(|| OwnerRecord::new(owner));
            let changed = record.apply(&mutation, entry.seq);

            tx.execute(
                "INSERT INTO ledger_entries (
                    seq, tx_id, prev_tx_id, caller, kind, tx_bytes, committed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.seq as i64,
                    entry.tx_id.as_bytes().as_slice(),
                    entry.prev_tx_id.as_ref().map(|id| id.as_bytes().as_slice()),
                    entry.caller.as_bytes().as_slice(),
                    entry.kind.to_u16() as i64,
                    entry.tx_bytes.as_ref(),
                    entry.committed_at,
                ],
            )?;

            tx.execute(
                "INSERT INTO owner_records (owner, handle, updated_at_seq) VALUES (?1, ?2, ?3)
                 ON CONFLICT(owner) DO UPDATE SET
                    handle = excluded.handle,
                    updated_at_seq = excluded.updated_at_seq",
                params![
                    owner.as_bytes().as_slice(),
                    record.handle.as_bytes().as_slice(),
                    record.updated_at_seq as i64,
                ],
            )?;

            match &mutation {
                RecordMutation::AddReader(reader) if changed => {
                    tx.execute(
                        "INSERT INTO authorized_readers (owner, reader, granted_at_seq)
                         VALUES (?1, ?2, ?3)",
                        params![
                            owner.as_bytes().as_slice(),
                            reader.as_bytes().as_slice(),
                            entry.seq as i64,
                        ],
                    )?;
                }
                RecordMutation::RemoveReader(reader) if changed => {
                    tx.execute(
                        "DELETE FROM authorized_readers WHERE owner = ?1 AND reader = ?2",
                        params![owner.as_bytes().as_slice(), reader.as_bytes().as_slice()],
                    )?;
                }
                _ => {}
            }

            tx.commit()?;
            Ok(CommitResult::Committed { changed })
        })
        .await
    }

    async fn get_entry(&self, tx_id: &TxId) -> Result<Option<LedgerEntry>> {
        let tx_id = *tx_id;
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE tx_id = ?1"),
                params![tx_id.as_bytes().as_slice()],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>> {
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE seq = ?1"),
                params![seq as i64],
                row_to_entry,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_entries_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEntry>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM ledger_entries
                 WHERE seq >= ?1 AND seq <= ?2 ORDER BY seq"
            ))?;
            let entries = stmt
                .query_map(params![start as i64, end as i64], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn head(&self) -> Result<Option<LedgerHead>> {
        self.blocking(|conn| {
            conn.query_row(
                "SELECT seq, tx_id FROM ledger_entries ORDER BY seq DESC LIMIT 1",
                [],
                |row| {
                    Ok(LedgerHead {
                        seq: row.get::<_, i64>(0)? as u64,
                        tx_id: TxId::from_bytes(blob32(row, 1, "tx_id")?),
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_record(&self, owner: &AccountId) -> Result<Option<OwnerRecord>> {
        let owner = *owner;
        self.blocking(move |conn| load_record(conn, &owner)).await
    }

    async fn find_owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>> {
        if handle.is_empty() {
            return Ok(None);
        }
        let handle = *handle;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT owner FROM owner_records WHERE handle = ?1 LIMIT 1",
                params![handle.as_bytes().as_slice()],
                |row| blob32(row, 0, "owner").map(AccountId::from_bytes),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_owners(&self) -> Result<Vec<AccountId>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare("SELECT owner FROM owner_records ORDER BY owner")?;
            let owners = stmt
                .query_map([], |row| blob32(row, 0, "owner").map(AccountId::from_bytes))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(owners)
        })
        .await
    }
}
