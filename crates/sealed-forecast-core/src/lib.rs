//! # Sealed Forecast Core
//!
//! Pure primitives for Sealed Forecast: accounts, ciphertext handles,
//! owner records, and signed registry transactions.
//!
//! This crate contains no storage and no networking; apart from reading the
//! wall clock in [`now_millis`] it is pure computation over cryptographic
//! data structures.
//!
//! ## Key Types
//!
//! - [`AccountId`] - An account, identified by its Ed25519 public key
//! - [`CiphertextHandle`] - Opaque 32-byte reference to an encrypted value
//! - [`RegistryAddress`] - Identifier of a deployed registry instance
//! - [`OwnerRecord`] - Per-owner registry state (handle + authorized readers)
//! - [`Transaction`] - A signed call into a registry
//!
//! ## Canonicalization
//!
//! All transactions are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod crypto;
pub mod error;
pub mod record;
pub mod time;
pub mod transaction;
pub mod types;
pub mod validation;

pub use canonical::{canonical_body_bytes, canonical_bytes, decode_transaction, encode_canonical};
pub use crypto::{AccountId, Keypair, Signature};
pub use error::{CoreError, ValidationError};
pub use record::{OwnerRecord, RecordMutation};
pub use time::now_millis;
pub use transaction::{CallKind, RegistryCall, Transaction, TransactionBuilder, TransactionHeader};
pub use types::{Blake3Hash, CiphertextHandle, RegistryAddress, TxId};
pub use validation::{validate_transaction, validate_transaction_structure};
