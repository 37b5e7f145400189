use thiserror::Error;

/// Failures decoding or checking keys, accounts, and transaction bytes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("signature does not verify")]
    InvalidSignature,

    #[error("not an Ed25519 public key")]
    InvalidPublicKey,

    #[error("malformed account: {0}")]
    MalformedAccount(String),

    #[error("transaction version {0} is not supported")]
    UnsupportedVersion(u8),

    #[error("transaction bytes: {0}")]
    MalformedTransaction(String),

    #[error("decode: {0}")]
    DecodingError(String),
}

/// Why a registry refused to consider a transaction at all.
///
/// Checked before any state is read; see `validate_transaction`.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("caller signature rejected")]
    SignatureFailed,

    #[error("version {0} is not accepted")]
    UnsupportedVersion(u8),

    #[error("submission carries the empty handle")]
    EmptyHandle,

    #[error("input proof is empty")]
    EmptyProof,

    #[error("input proof of {0} bytes exceeds the maximum")]
    ProofTooLarge(usize),

    #[error("malformed: {0}")]
    StructuralError(String),
}

impl From<CoreError> for ValidationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::UnsupportedVersion(v) => ValidationError::UnsupportedVersion(v),
            CoreError::MalformedAccount(msg)
            | CoreError::MalformedTransaction(msg)
            | CoreError::DecodingError(msg) => ValidationError::StructuralError(msg),
        }
    }
}
