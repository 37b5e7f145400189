//! Error types for the registry.

use sealed_forecast_core::{AccountId, CoreError, RegistryAddress, ValidationError};
use sealed_forecast_store::StoreError;
use thiserror::Error;

/// Errors returned by registry calls. Every error is terminal for the call:
/// nothing is committed.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Caller tried to mutate a record it does not own.
    #[error("caller {caller} may not modify the record of {owner}")]
    Unauthorized { caller: AccountId, owner: AccountId },

    /// The input proof does not bind the handle to (owner, registry).
    #[error("input proof rejected")]
    InvalidProof,

    /// Owner tried to grant or revoke itself.
    #[error("{0} cannot grant or revoke itself")]
    SelfGrantRejected(AccountId),

    /// Transaction addressed to another registry.
    #[error("transaction for registry {got} sent to {expected}")]
    WrongRegistry {
        expected: RegistryAddress,
        got: RegistryAddress,
    },

    /// Signature does not verify against the claimed caller.
    #[error("invalid transaction signature")]
    InvalidSignature,

    /// Structural validation failed.
    #[error("invalid transaction: {0}")]
    Validation(ValidationError),

    /// Transaction bytes could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] CoreError),

    /// The ledger position was taken by another transaction.
    #[error("ledger conflict at seq {seq}")]
    Conflict { seq: u64 },

    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::SignatureFailed => RegistryError::InvalidSignature,
            other => RegistryError::Validation(other),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
