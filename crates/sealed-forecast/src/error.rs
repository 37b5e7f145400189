//! Error types for the forecast session.

use sealed_forecast_client::{ClientError, StatusCategory};
use sealed_forecast_registry::RegistryError;
use sealed_forecast_store::StoreError;
use thiserror::Error;

/// Errors that can occur during forecast operations.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// No signer is connected.
    #[error("no account connected")]
    NotConnected,

    /// A submission is already running.
    #[error("a submission is already in progress")]
    SubmissionInFlight,

    /// The account has no stored prediction.
    #[error("no prediction to decrypt")]
    NothingToDecrypt,

    /// The ledger did not confirm in time.
    #[error("timed out waiting for transaction confirmation")]
    SubmissionTimeout,

    /// The connection was dropped mid-operation.
    #[error("cancelled")]
    Cancelled,

    /// Date text could not be turned into a timestamp, or back.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Client error.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Registry error.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ForecastError {
    /// Where this failure is reported.
    pub fn category(&self) -> StatusCategory {
        match self {
            ForecastError::Client(e) => e.category(),
            ForecastError::NothingToDecrypt => StatusCategory::Decryption,
            _ => StatusCategory::Submission,
        }
    }
}

/// Result type for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;
