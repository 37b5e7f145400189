//! # Sealed Forecast Registry
//!
//! The ledger-resident state machine holding, per owner account, the latest
//! ciphertext handle and the set of accounts authorized to decrypt it.
//!
//! ## Model
//!
//! - Every mutation is a signed [`Transaction`](sealed_forecast_core::Transaction)
//! - The signature author is the caller; only the owner may mutate a record
//! - Submissions carry an input proof checked by an [`InputVerifier`]
//! - Grants and revokes are idempotent; self-grants are rejected
//! - `is_authorized(owner, reader)` holds iff `reader == owner` or `reader` was
//!   granted and not since revoked
//!
//! The registry also implements [`AccessPolicy`], the read-only view a
//! decryption backend consults before releasing a plaintext.

pub mod error;
pub mod policy;
pub mod registry;
pub mod verifier;

pub use error::{RegistryError, Result};
pub use policy::AccessPolicy;
pub use registry::{EncryptedValueRegistry, RegistryConfig, TxOutcome};
pub use verifier::{AcceptAll, InputVerifier};
