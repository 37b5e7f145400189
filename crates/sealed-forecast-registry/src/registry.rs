//! The encrypted value registry.
//!
//! Holds one [`OwnerRecord`] per account, mutated only by signed
//! transactions from that account. Commits are serialized through a single
//! async mutex standing in for ledger ordering; each commit appends a ledger
//! entry and applies its record mutation atomically.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use sealed_forecast_core::{
    canonical_bytes, decode_transaction, now_millis, validate_transaction,
    validate_transaction_structure,
    AccountId, CallKind, CiphertextHandle, OwnerRecord, RecordMutation, RegistryAddress,
    RegistryCall, Transaction, TxId,
};
use sealed_forecast_store::{
    CommitResult, LedgerEntry, LedgerHead, LedgerStore, LedgerStoreExt,
};

use crate::error::{RegistryError, Result};
use crate::policy::AccessPolicy;
use crate::verifier::InputVerifier;

/// Configuration for a registry instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Deployment name; with the deployer it determines the address.
    pub name: String,
    /// Whether to verify transaction signatures on ingest.
    pub verify_signatures: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            name: "SecretTGE".to_string(),
            verify_signatures: true,
        }
    }
}

/// The outcome of an accepted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_id: TxId,
    /// Ledger position of the transaction.
    pub seq: u64,
    pub kind: CallKind,
    /// Whether the owner record changed. False for idempotent grants/revokes
    /// and for replays.
    pub changed: bool,
    /// The transaction had already been committed; nothing was done.
    pub replayed: bool,
}

/// A deployed registry over a ledger store.
pub struct EncryptedValueRegistry<S: LedgerStore> {
    address: RegistryAddress,
    store: Arc<S>,
    verifier: Arc<dyn InputVerifier>,
    config: RegistryConfig,
    /// Serializes commits.
    commit_lock: Mutex<()>,
}

impl<S: LedgerStore> EncryptedValueRegistry<S> {
    /// Deploy a registry at `RegistryAddress::derive(deployer, config.name)`.
    ///
    /// Deploying the same name from the same deployer over the same store
    /// reopens the same registry.
    pub fn deploy(
        deployer: &AccountId,
        store: S,
        verifier: Arc<dyn InputVerifier>,
        config: RegistryConfig,
    ) -> Self {
        let address = RegistryAddress::derive(deployer, &config.name);
        tracing::info!(registry = %address, name = %config.name, "registry deployed");
        Self::at_address(address, store, verifier, config)
    }

    /// Open a registry at a known address.
    pub fn at_address(
        address: RegistryAddress,
        store: S,
        verifier: Arc<dyn InputVerifier>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            address,
            store: Arc::new(store),
            verifier,
            config,
            commit_lock: Mutex::new(()),
        }
    }

    /// This registry's address.
    pub fn address(&self) -> RegistryAddress {
        self.address
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Decode and execute a transaction received as canonical bytes.
    pub async fn execute_bytes(&self, bytes: &[u8]) -> Result<TxOutcome> {
        let tx = decode_transaction(bytes)?;
        self.execute(&tx).await
    }

    /// Execute a signed transaction.
    ///
    /// Checks, in order: target registry, signature and structure, replay,
    /// ownership, then the call-specific rules. A rejected transaction
    /// commits nothing.
    pub async fn execute(&self, tx: &Transaction) -> Result<TxOutcome> {
        if tx.header.registry != self.address {
            return Err(RegistryError::WrongRegistry {
                expected: self.address,
                got: tx.header.registry,
            });
        }

        if self.config.verify_signatures {
            validate_transaction(tx)?;
        } else {
            validate_transaction_structure(tx)?;
        }

        let tx_id = tx.compute_id();
        let caller = *tx.caller();

        let _guard = self.commit_lock.lock().await;

        if let Some(entry) = self.store.get_entry(&tx_id).await? {
            tracing::debug!(tx = %tx_id, seq = entry.seq, "transaction replayed");
            return Ok(TxOutcome {
                tx_id,
                seq: entry.seq,
                kind: entry.kind,
                changed: false,
                replayed: true,
            });
        }

        let owner = *tx.owner();
        if caller != owner {
            tracing::warn!(caller = %caller, owner = %owner, kind = ?tx.kind(), "unauthorized call rejected");
            return Err(RegistryError::Unauthorized { caller, owner });
        }

        let mutation = self.plan_mutation(&owner, &tx.call)?;

        let (seq, prev_tx_id) = self.store.next_position().await?;
        let entry = LedgerEntry {
            seq,
            tx_id,
            prev_tx_id,
            caller,
            kind: tx.kind(),
            tx_bytes: Bytes::from(canonical_bytes(tx)),
            committed_at: now_millis(),
        };

        match self.store.commit(&entry, &owner, &mutation).await? {
            CommitResult::Committed { changed } => {
                tracing::info!(
                    registry = %self.address,
                    owner = %owner,
                    kind = ?entry.kind,
                    seq,
                    changed,
                    "transaction committed"
                );
                Ok(TxOutcome {
                    tx_id,
                    seq,
                    kind: entry.kind,
                    changed,
                    replayed: false,
                })
            }
            CommitResult::AlreadyCommitted { seq } => Ok(TxOutcome {
                tx_id,
                seq,
                kind: entry.kind,
                changed: false,
                replayed: true,
            }),
            CommitResult::Conflict { .. } => Err(RegistryError::Conflict { seq }),
        }
    }

    /// Translate a call into the record mutation it causes, enforcing the
    /// call-specific rules.
    fn plan_mutation(&self, owner: &AccountId, call: &RegistryCall) -> Result<RecordMutation> {
        match call {
            RegistryCall::Submit { handle, proof } => {
                if !self.verifier.verify(handle, proof, owner, &self.address) {
                    tracing::warn!(owner = %owner, handle = %handle, "input proof rejected");
                    return Err(RegistryError::InvalidProof);
                }
                Ok(RecordMutation::SetHandle(*handle))
            }
            RegistryCall::Grant { reader } => {
                if reader == owner {
                    return Err(RegistryError::SelfGrantRejected(*owner));
                }
                Ok(RecordMutation::AddReader(*reader))
            }
            RegistryCall::Revoke { reader } => {
                if reader == owner {
                    return Err(RegistryError::SelfGrantRejected(*owner));
                }
                Ok(RecordMutation::RemoveReader(*reader))
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether `account` has submitted a value.
    pub async fn has_value(&self, account: &AccountId) -> Result<bool> {
        Ok(self
            .store
            .get_record(account)
            .await?
            .is_some_and(|r| r.has_value()))
    }

    /// The account's current handle; empty if it never submitted.
    pub async fn value_of(&self, account: &AccountId) -> Result<CiphertextHandle> {
        Ok(self.store.handle_of(account).await?)
    }

    /// The account's full record, if it ever transacted.
    pub async fn record_of(&self, account: &AccountId) -> Result<Option<OwnerRecord>> {
        Ok(self.store.get_record(account).await?)
    }

    /// Readers granted by `owner`, in account order. Never includes the owner.
    pub async fn authorized_readers(&self, owner: &AccountId) -> Result<Vec<AccountId>> {
        Ok(self
            .store
            .get_record(owner)
            .await?
            .map(|r| r.readers.into_iter().collect())
            .unwrap_or_default())
    }

    /// `reader == account || reader ∈ authorized_readers(account)`.
    pub async fn is_authorized(&self, account: &AccountId, reader: &AccountId) -> Result<bool> {
        if account == reader {
            return Ok(true);
        }
        Ok(self
            .store
            .get_record(account)
            .await?
            .is_some_and(|r| r.is_authorized(reader)))
    }

    /// The owner whose current value is `handle`.
    pub async fn owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>> {
        Ok(self.store.find_owner_of(handle).await?)
    }

    /// Latest ledger position.
    pub async fn head(&self) -> Result<Option<LedgerHead>> {
        Ok(self.store.head().await?)
    }

    /// Ledger entries with `start <= seq <= end`.
    pub async fn entries(&self, start: u64, end: u64) -> Result<Vec<LedgerEntry>> {
        Ok(self.store.get_entries_range(start, end).await?)
    }

    /// Decode the transaction committed at `seq`.
    pub async fn transaction_at(&self, seq: u64) -> Result<Option<Transaction>> {
        match self.store.get_entry_at(seq).await? {
            Some(entry) => Ok(Some(decode_transaction(&entry.tx_bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<S: LedgerStore> AccessPolicy for EncryptedValueRegistry<S> {
    fn address(&self) -> RegistryAddress {
        self.address
    }

    async fn owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>> {
        EncryptedValueRegistry::owner_of(self, handle).await
    }

    async fn is_authorized(&self, owner: &AccountId, reader: &AccountId) -> Result<bool> {
        EncryptedValueRegistry::is_authorized(self, owner, reader).await
    }
}
