//! Error types for encryption backends.

use sealed_forecast_core::CiphertextHandle;
use sealed_forecast_registry::RegistryError;
use thiserror::Error;

/// Errors that can occur talking to an encryption backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The authorization was refused (bad signature, wrong scope, or the
    /// signer is not an authorized reader).
    #[error("authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// The authorization is outside its validity window.
    #[error("authorization expired")]
    AuthorizationExpired,

    /// The backend cannot be reached.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend holds no ciphertext for this handle.
    #[error("unknown or malformed handle: {0}")]
    MalformedHandle(CiphertextHandle),

    /// Encryption error.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    Decryption(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The access policy could not be consulted.
    #[error("access policy error: {0}")]
    Policy(#[from] RegistryError),
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
