//! LedgerStore trait: the abstract interface for registry persistence.
//!
//! A ledger is a totally ordered log of signed transactions. Each committed
//! entry carries exactly one [`RecordMutation`] against the caller's owner
//! record, and the two are persisted atomically.

use async_trait::async_trait;
use bytes::Bytes;
use sealed_forecast_core::{AccountId, CallKind, CiphertextHandle, OwnerRecord, RecordMutation, TxId};

use crate::error::Result;

/// One committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Position in the ledger, starting at 1.
    pub seq: u64,
    /// Content-addressed transaction ID.
    pub tx_id: TxId,
    /// ID of the entry at `seq - 1` (None for the first entry).
    pub prev_tx_id: Option<TxId>,
    /// The authenticated caller.
    pub caller: AccountId,
    /// The call discriminator.
    pub kind: CallKind,
    /// Canonical transaction bytes (body || signature).
    pub tx_bytes: Bytes,
    /// When the entry was committed (Unix ms, local clock).
    pub committed_at: i64,
}

/// The latest committed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerHead {
    pub seq: u64,
    pub tx_id: TxId,
}

/// Result of committing an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Entry and mutation were applied.
    Committed {
        /// Whether the owner record actually changed.
        changed: bool,
    },
    /// The transaction was already committed (idempotent - not an error).
    AlreadyCommitted {
        /// Where the original commit landed.
        seq: u64,
    },
    /// Conflict: a different transaction already occupies `seq`.
    Conflict {
        /// The transaction at this position.
        existing: TxId,
    },
}

/// The LedgerStore trait: async interface for ledger persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the runtime.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Ledger Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Commit an entry and apply `mutation` to `owner`'s record.
    ///
    /// # Returns
    /// - `Committed` if the entry was new.
    /// - `AlreadyCommitted` if an entry with the same `tx_id` exists.
    /// - `Conflict` if a different entry exists at `entry.seq`.
    ///
    /// Fails with `NotContiguous` if `entry.seq` skips past the head.
    async fn commit(
        &self,
        entry: &LedgerEntry,
        owner: &AccountId,
        mutation: &RecordMutation,
    ) -> Result<CommitResult>;

    /// Get an entry by transaction ID.
    async fn get_entry(&self, tx_id: &TxId) -> Result<Option<LedgerEntry>>;

    /// Get an entry by position.
    async fn get_entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>>;

    /// Get entries with `start <= seq <= end`, ordered by seq.
    async fn get_entries_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEntry>>;

    /// The latest committed position, or None for an empty ledger.
    async fn head(&self) -> Result<Option<LedgerHead>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get an owner's record. None if the owner never transacted.
    async fn get_record(&self, owner: &AccountId) -> Result<Option<OwnerRecord>>;

    /// Find the owner whose current handle is `handle`.
    async fn find_owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>>;

    /// List all owners with a record, in account order.
    async fn list_owners(&self) -> Result<Vec<AccountId>>;
}

/// Extension trait for common store patterns.
#[async_trait]
pub trait LedgerStoreExt: LedgerStore {
    /// The `(seq, prev_tx_id)` the next entry must use.
    async fn next_position(&self) -> Result<(u64, Option<TxId>)> {
        Ok(match self.head().await? {
            Some(head) => (head.seq + 1, Some(head.tx_id)),
            None => (1, None),
        })
    }

    /// The owner's current handle, or the empty handle if none.
    async fn handle_of(&self, owner: &AccountId) -> Result<CiphertextHandle> {
        Ok(self
            .get_record(owner)
            .await?
            .map(|r| r.handle)
            .unwrap_or(CiphertextHandle::EMPTY))
    }
}

impl<S: LedgerStore + ?Sized> LedgerStoreExt for S {}
