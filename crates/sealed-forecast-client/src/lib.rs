//! # Sealed Forecast Client
//!
//! Everything a front end needs to talk to a registry and a coprocessor.
//!
//! ## Overview
//!
//! - [`EncryptionRequestBuilder`] turns a plaintext into an encrypted input
//! - [`LedgerClient`] submits signed transactions and reads owner records
//! - [`Signer`] approves transactions and decryption authorizations
//! - [`AuthorizationCache`] keeps approved authorizations per `(signer, scope)`
//! - [`DecryptionOrchestrator`] runs all-or-nothing decryption sessions and
//!   owns the resolved values
//! - [`Status`] is the user-facing message left behind by an operation

pub mod authorization;
pub mod builder;
pub mod cache;
pub mod error;
pub mod ledger;
pub mod orchestrator;
pub mod signer;
pub mod status;

pub use authorization::Authorization;
pub use builder::EncryptionRequestBuilder;
pub use cache::AuthorizationCache;
pub use error::{ClientError, Result};
pub use ledger::{LedgerClient, LocalLedgerClient};
pub use orchestrator::{DecryptionConfig, DecryptionOrchestrator, SessionState};
pub use signer::{KeypairSigner, Signer};
pub use status::{Status, StatusCategory};

// Re-exported so callers can cancel sessions without a direct dependency.
pub use tokio_util::sync::CancellationToken;
