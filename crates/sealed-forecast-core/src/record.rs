//! Owner records: the per-account state of a registry.
//!
//! A record holds the owner's latest ciphertext handle and the set of
//! accounts (besides the owner) allowed to request its decryption. Records
//! are created implicitly by the owner's first mutation and never deleted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::AccountId;
use crate::types::CiphertextHandle;

/// State of a single owner in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRecord {
    /// The account this record belongs to.
    pub owner: AccountId,

    /// Latest submitted handle; empty until the first submission.
    pub handle: CiphertextHandle,

    /// Accounts other than the owner allowed to decrypt `handle`.
    ///
    /// Never contains `owner`.
    pub readers: BTreeSet<AccountId>,

    /// Ledger sequence of the last mutation applied to this record.
    pub updated_at_seq: u64,
}

impl OwnerRecord {
    /// A fresh record with no handle and no readers.
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            handle: CiphertextHandle::EMPTY,
            readers: BTreeSet::new(),
            updated_at_seq: 0,
        }
    }

    /// Whether a value has been submitted.
    pub fn has_value(&self) -> bool {
        !self.handle.is_empty()
    }

    /// `reader == owner || reader ∈ readers`.
    pub fn is_authorized(&self, reader: &AccountId) -> bool {
        *reader == self.owner || self.readers.contains(reader)
    }

    /// Apply a mutation in place.
    ///
    /// Returns whether the record changed. Adding a present reader or
    /// removing an absent one leaves the record untouched.
    pub fn apply(&mut self, mutation: &RecordMutation, seq: u64) -> bool {
        let changed = match mutation {
            RecordMutation::SetHandle(handle) => {
                // Resubmitting the same handle still counts as a write.
                self.handle = *handle;
                true
            }
            RecordMutation::AddReader(reader) => self.readers.insert(*reader),
            RecordMutation::RemoveReader(reader) => self.readers.remove(reader),
        };

        if changed {
            self.updated_at_seq = seq;
        }
        changed
    }
}

/// A single state change to an owner record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordMutation {
    /// Overwrite the handle (last write wins).
    SetHandle(CiphertextHandle),
    /// Insert a reader into the authorized set.
    AddReader(AccountId),
    /// Remove a reader from the authorized set.
    RemoveReader(AccountId),
}
