//! Transactions: signed calls into a registry.
//!
//! Every registry mutation arrives as a transaction signed by its caller.
//! The ledger treats the signature author as the authenticated caller, so
//! "caller must equal owner" is checked against a key, not a claim.

use bytes::Bytes;

use crate::canonical::{canonical_body_bytes, canonical_bytes};
use crate::crypto::{AccountId, Keypair, Signature};
use crate::types::{Blake3Hash, CiphertextHandle, RegistryAddress, TxId};

/// The current transaction schema version.
pub const TX_VERSION: u8 = 0;

/// Upper bound on the size of an input proof carried by a submission.
pub const MAX_PROOF_LEN: usize = 4096;

/// Discriminator for the call carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CallKind {
    /// Submit or overwrite the caller's encrypted value.
    Submit = 0x0001,
    /// Authorize a reader.
    Grant = 0x0100,
    /// Deauthorize a reader.
    Revoke = 0x0101,
}

impl CallKind {
    /// Convert to u16 for serialization.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Try to parse from u16.
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::Submit),
            0x0100 => Some(Self::Grant),
            0x0101 => Some(Self::Revoke),
            _ => None,
        }
    }

    /// Check if this kind touches the reader set.
    pub fn is_permission(self) -> bool {
        (self.to_u16() & 0xFF00) == 0x0100
    }
}

/// The body of a registry call.
///
/// The owner record a call targets lives in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    /// `submit(handle, proof)`.
    Submit {
        /// The new ciphertext handle.
        handle: CiphertextHandle,
        /// Input proof binding `handle` to `(caller, registry)`.
        proof: Bytes,
    },
    /// `grant(reader)`.
    Grant {
        /// The account to authorize.
        reader: AccountId,
    },
    /// `revoke(reader)`.
    Revoke {
        /// The account to deauthorize.
        reader: AccountId,
    },
}

impl RegistryCall {
    /// The discriminator for this call.
    pub fn kind(&self) -> CallKind {
        match self {
            RegistryCall::Submit { .. } => CallKind::Submit,
            RegistryCall::Grant { .. } => CallKind::Grant,
            RegistryCall::Revoke { .. } => CallKind::Revoke,
        }
    }
}

/// Transaction metadata covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHeader {
    /// Schema version (currently 0).
    pub version: u8,

    /// The registry this transaction is addressed to.
    pub registry: RegistryAddress,

    /// The signing account.
    pub caller: AccountId,

    /// The owner record this call targets. Accepted only when equal to `caller`.
    pub owner: AccountId,

    /// Caller-chosen nonce; distinguishes otherwise identical calls.
    pub nonce: u64,

    /// Caller-claimed timestamp (Unix milliseconds). Untrusted.
    pub timestamp: i64,
}

/// A complete transaction: header + call + signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The transaction header.
    pub header: TransactionHeader,

    /// The call being made.
    pub call: RegistryCall,

    /// Ed25519 signature over the canonical body.
    pub signature: Signature,
}

impl Transaction {
    /// Compute the transaction ID (Blake3 hash of canonical bytes).
    pub fn compute_id(&self) -> TxId {
        let bytes = canonical_bytes(self);
        TxId(Blake3Hash::hash(&bytes).0)
    }

    /// The authenticated caller.
    pub fn caller(&self) -> &AccountId {
        &self.header.caller
    }

    /// The targeted owner record.
    pub fn owner(&self) -> &AccountId {
        &self.header.owner
    }

    /// The target registry.
    pub fn registry(&self) -> &RegistryAddress {
        &self.header.registry
    }

    /// The call discriminator.
    pub fn kind(&self) -> CallKind {
        self.call.kind()
    }
}

/// Builder for creating signed transactions.
pub struct TransactionBuilder {
    registry: RegistryAddress,
    owner: Option<AccountId>,
    nonce: u64,
    timestamp: i64,
    call: RegistryCall,
}

impl TransactionBuilder {
    /// Start building a transaction for `call` against `registry`.
    pub fn new(registry: RegistryAddress, call: RegistryCall) -> Self {
        Self {
            registry,
            owner: None,
            nonce: 0,
            timestamp: 0,
            call,
        }
    }

    /// Shorthand for a submission.
    pub fn submit(registry: RegistryAddress, handle: CiphertextHandle, proof: impl Into<Bytes>) -> Self {
        Self::new(
            registry,
            RegistryCall::Submit {
                handle,
                proof: proof.into(),
            },
        )
    }

    /// Shorthand for a grant.
    pub fn grant(registry: RegistryAddress, reader: AccountId) -> Self {
        Self::new(registry, RegistryCall::Grant { reader })
    }

    /// Shorthand for a revoke.
    pub fn revoke(registry: RegistryAddress, reader: AccountId) -> Self {
        Self::new(registry, RegistryCall::Revoke { reader })
    }

    /// Target another account's record. Defaults to the signer.
    pub fn owner(mut self, owner: AccountId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Set the nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Set the timestamp.
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = ts;
        self
    }

    /// Build and sign the transaction. The keypair's account becomes the caller.
    pub fn sign(self, keypair: &Keypair) -> Transaction {
        let caller = keypair.account();
        let header = TransactionHeader {
            version: TX_VERSION,
            registry: self.registry,
            caller,
            owner: self.owner.unwrap_or(caller),
            nonce: self.nonce,
            timestamp: self.timestamp,
        };

        let message = canonical_body_bytes(&header, &self.call);
        let signature = keypair.sign(&message);

        Transaction {
            header,
            call: self.call,
            signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> RegistryAddress {
        RegistryAddress::from_bytes([0x77; 32])
    }

    #[test]
    fn test_call_kind_roundtrip() {
        for kind in [CallKind::Submit, CallKind::Grant, CallKind::Revoke] {
            assert_eq!(CallKind::from_u16(kind.to_u16()), Some(kind));
        }
        assert_eq!(CallKind::from_u16(0x0200), None);
    }

    #[test]
    fn test_call_kind_categories() {
        assert!(!CallKind::Submit.is_permission());
        assert!(CallKind::Grant.is_permission());
        assert!(CallKind::Revoke.is_permission());
    }

    #[test]
    fn test_builder_sets_caller_from_keypair() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let tx = TransactionBuilder::grant(registry(), AccountId::from_bytes([1; 32]))
            .nonce(3)
            .timestamp(1_700_000_000_000)
            .sign(&keypair);

        assert_eq!(tx.caller(), &keypair.account());
        assert_eq!(tx.owner(), &keypair.account());
        assert_eq!(tx.kind(), CallKind::Grant);
        assert_eq!(tx.header.nonce, 3);
    }

    #[test]
    fn test_tx_id_deterministic_and_nonce_sensitive() {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        let handle = CiphertextHandle::from_bytes([0x11; 32]);

        let tx1 = TransactionBuilder::submit(registry(), handle, vec![1, 2, 3])
            .nonce(1)
            .sign(&keypair);
        let tx1_again = TransactionBuilder::submit(registry(), handle, vec![1, 2, 3])
            .nonce(1)
            .sign(&keypair);
        let tx2 = TransactionBuilder::submit(registry(), handle, vec![1, 2, 3])
            .nonce(2)
            .sign(&keypair);

        assert_eq!(tx1.compute_id(), tx1_again.compute_id());
        assert_ne!(tx1.compute_id(), tx2.compute_id());
    }
}
