//! In-memory implementation of the LedgerStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sealed_forecast_core::{AccountId, CiphertextHandle, OwnerRecord, RecordMutation, TxId};

use crate::error::{Result, StoreError};
use crate::traits::{CommitResult, LedgerEntry, LedgerHead, LedgerStore};

/// In-memory ledger.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryLedger {
    inner: RwLock<MemoryLedgerInner>,
}

#[derive(Default)]
struct MemoryLedgerInner {
    /// Entries indexed by seq.
    entries: BTreeMap<u64, LedgerEntry>,

    /// tx_id -> seq.
    by_id: HashMap<TxId, u64>,

    /// Owner records.
    records: BTreeMap<AccountId, OwnerRecord>,

    /// Current handle -> owner.
    handles: HashMap<CiphertextHandle, AccountId>,
}

impl MemoryLedger {
    /// Create a new empty in-memory ledger.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryLedgerInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryLedgerInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryLedgerInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn commit(
        &self,
        entry: &LedgerEntry,
        owner: &AccountId,
        mutation: &RecordMutation,
    ) -> Result<CommitResult> {
        let mut inner = self.write()?;

        if let Some(&seq) = inner.by_id.get(&entry.tx_id) {
            return Ok(CommitResult::AlreadyCommitted { seq });
        }

        if let Some(existing) = inner.entries.get(&entry.seq) {
            return Ok(CommitResult::Conflict {
                existing: existing.tx_id,
            });
        }

        let head = inner.entries.keys().next_back().copied().unwrap_or(0);
        if entry.seq != head + 1 {
            return Err(StoreError::NotContiguous {
                seq: entry.seq,
                head,
            });
        }

        let mut record = inner
            .records
            .get(owner)
            .cloned()
            .unwrap_or_else(|| OwnerRecord::new(*owner));
        let previous_handle = record.handle;
        let changed = record.apply(mutation, entry.seq);

        if record.handle != previous_handle {
            inner.handles.remove(&previous_handle);
        }
        if record.has_value() {
            inner.handles.insert(record.handle, *owner);
        }

        inner.records.insert(*owner, record);
        inner.by_id.insert(entry.tx_id, entry.seq);
        inner.entries.insert(entry.seq, entry.clone());

        Ok(CommitResult::Committed { changed })
    }

    async fn get_entry(&self, tx_id: &TxId) -> Result<Option<LedgerEntry>> {
        let inner = self.read()?;
        Ok(inner
            .by_id
            .get(tx_id)
            .and_then(|seq| inner.entries.get(seq))
            .cloned())
    }

    async fn get_entry_at(&self, seq: u64) -> Result<Option<LedgerEntry>> {
        Ok(self.read()?.entries.get(&seq).cloned())
    }

    async fn get_entries_range(&self, start: u64, end: u64) -> Result<Vec<LedgerEntry>> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .read()?
            .entries
            .range(start..=end)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn head(&self) -> Result<Option<LedgerHead>> {
        Ok(self
            .read()?
            .entries
            .values()
            .next_back()
            .map(|e| LedgerHead {
                seq: e.seq,
                tx_id: e.tx_id,
            }))
    }

    async fn get_record(&self, owner: &AccountId) -> Result<Option<OwnerRecord>> {
        Ok(self.read()?.records.get(owner).cloned())
    }

    async fn find_owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>> {
        if handle.is_empty() {
            return Ok(None);
        }
        Ok(self.read()?.handles.get(handle).copied())
    }

    async fn list_owners(&self) -> Result<Vec<AccountId>> {
        Ok(self.read()?.records.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use sealed_forecast_core::CallKind;

    use crate::traits::LedgerStoreExt;

    fn account(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    fn entry(seq: u64, id: u8, prev: Option<u8>) -> LedgerEntry {
        LedgerEntry {
            seq,
            tx_id: TxId::from_bytes([id; 32]),
            prev_tx_id: prev.map(|p| TxId::from_bytes([p; 32])),
            caller: account(1),
            kind: CallKind::Submit,
            tx_bytes: Bytes::from_static(b"tx"),
            committed_at: 1_000,
        }
    }

    #[tokio::test]
    async fn test_memory_ledger_basic() {
        let store = MemoryLedger::new();
        let handle = CiphertextHandle::from_bytes([0xAA; 32]);

        let result = store
            .commit(&entry(1, 1, None), &account(1), &RecordMutation::SetHandle(handle))
            .await
            .unwrap();
        assert_eq!(result, CommitResult::Committed { changed: true });

        let record = store.get_record(&account(1)).await.unwrap().unwrap();
        assert_eq!(record.handle, handle);
        assert_eq!(record.updated_at_seq, 1);
        assert_eq!(store.find_owner_of(&handle).await.unwrap(), Some(account(1)));
        assert_eq!(store.handle_of(&account(2)).await.unwrap(), CiphertextHandle::EMPTY);
    }

    #[tokio::test]
    async fn test_memory_ledger_idempotent() {
        let store = MemoryLedger::new();
        let mutation = RecordMutation::AddReader(account(2));

        store.commit(&entry(1, 1, None), &account(1), &mutation).await.unwrap();
        let again = store.commit(&entry(1, 1, None), &account(1), &mutation).await.unwrap();
        assert_eq!(again, CommitResult::AlreadyCommitted { seq: 1 });
        assert_eq!(store.head().await.unwrap().unwrap().seq, 1);
    }

    #[tokio::test]
    async fn test_memory_ledger_conflict_and_gap() {
        let store = MemoryLedger::new();
        let mutation = RecordMutation::AddReader(account(2));

        store.commit(&entry(1, 1, None), &account(1), &mutation).await.unwrap();
        let conflict = store.commit(&entry(1, 9, None), &account(1), &mutation).await.unwrap();
        assert_eq!(
            conflict,
            CommitResult::Conflict {
                existing: TxId::from_bytes([1; 32])
            }
        );

        let gap = store.commit(&entry(5, 5, Some(1)), &account(1), &mutation).await;
        assert!(matches!(gap, Err(StoreError::NotContiguous { seq: 5, head: 1 })));
    }

    #[tokio::test]
    async fn test_handle_index_follows_overwrite() {
        let store = MemoryLedger::new();
        let h1 = CiphertextHandle::from_bytes([0x11; 32]);
        let h2 = CiphertextHandle::from_bytes([0x22; 32]);

        store
            .commit(&entry(1, 1, None), &account(1), &RecordMutation::SetHandle(h1))
            .await
            .unwrap();
        store
            .commit(&entry(2, 2, Some(1)), &account(1), &RecordMutation::SetHandle(h2))
            .await
            .unwrap();

        assert_eq!(store.find_owner_of(&h1).await.unwrap(), None);
        assert_eq!(store.find_owner_of(&h2).await.unwrap(), Some(account(1)));
        assert_eq!(store.next_position().await.unwrap(), (3, Some(TxId::from_bytes([2; 32]))));
    }
}
