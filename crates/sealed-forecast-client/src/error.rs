//! Error types for the client.

use sealed_forecast_backend::BackendError;
use sealed_forecast_core::CiphertextHandle;
use sealed_forecast_registry::RegistryError;
use thiserror::Error;

use crate::status::StatusCategory;

/// Errors surfaced to client code.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Plaintext does not fit the 32-bit value slot.
    #[error("plaintext {0} exceeds u32::MAX")]
    InvalidPlaintext(u64),

    /// The encryption backend cannot be reached.
    #[error("encryption backend unavailable: {0}")]
    EncryptionBackendUnavailable(String),

    /// The decryption backend cannot be reached.
    #[error("decryption backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend refused the authorization.
    #[error("authorization rejected: {0}")]
    AuthorizationRejected(String),

    /// The authorization is outside its validity window.
    #[error("authorization expired")]
    AuthorizationExpired,

    /// The signer declined to approve an authorization.
    #[error("authorization request denied by signer")]
    ApprovalDenied,

    /// The signer did not answer in time.
    #[error("timed out waiting for signer approval")]
    ApprovalTimeout,

    /// The backend did not answer in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The session was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// Another decryption session is already running.
    #[error("a decryption session is already in flight")]
    SessionInFlight,

    /// A handle re-resolved to a different plaintext than recorded.
    #[error("handle {handle} re-resolved to a different value")]
    ResultDivergence { handle: CiphertextHandle },

    /// The backend holds no ciphertext for this handle in the requested scope.
    #[error("unknown or malformed handle: {0}")]
    MalformedHandle(CiphertextHandle),

    /// The backend answered without a value for a requested handle.
    #[error("no value returned for handle {0}")]
    MissingResult(CiphertextHandle),

    /// Other backend failure.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// Registry failure.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl From<BackendError> for ClientError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::AuthorizationRejected(msg) => ClientError::AuthorizationRejected(msg),
            BackendError::AuthorizationExpired => ClientError::AuthorizationExpired,
            BackendError::Unavailable(msg) => ClientError::BackendUnavailable(msg),
            BackendError::MalformedHandle(handle) => ClientError::MalformedHandle(handle),
            other => ClientError::Backend(other),
        }
    }
}

impl ClientError {
    /// Where this failure is reported.
    pub fn category(&self) -> StatusCategory {
        match self {
            ClientError::InvalidPlaintext(_)
            | ClientError::EncryptionBackendUnavailable(_)
            | ClientError::Registry(_) => StatusCategory::Submission,
            ClientError::AuthorizationRejected(_)
            | ClientError::AuthorizationExpired
            | ClientError::ApprovalDenied
            | ClientError::ApprovalTimeout => StatusCategory::Authorization,
            ClientError::BackendUnavailable(_)
            | ClientError::Timeout(_)
            | ClientError::Cancelled
            | ClientError::SessionInFlight
            | ClientError::ResultDivergence { .. }
            | ClientError::MalformedHandle(_)
            | ClientError::MissingResult(_)
            | ClientError::Backend(_) => StatusCategory::Decryption,
        }
    }

    /// Whether the cached authorization that produced this error is unusable.
    pub fn invalidates_authorization(&self) -> bool {
        matches!(
            self,
            ClientError::AuthorizationRejected(_) | ClientError::AuthorizationExpired
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
