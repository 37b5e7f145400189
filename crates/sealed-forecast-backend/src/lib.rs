//! # Sealed Forecast Backend
//!
//! Seams to the encryption coprocessor plus an in-process stand-in.
//!
//! ## Overview
//!
//! - [`EncryptionBackend`] turns a plaintext into a handle and an input proof
//! - [`DecryptionBackend`] re-encrypts stored values for an authorized reader
//! - [`PublicAuthorization`] is the signed artifact a reader presents
//! - [`SealedValue`] carries one plaintext sealed to the reader's X25519 key
//! - [`LocalCoprocessor`] implements all of the above, plus the registry's
//!   [`InputVerifier`](sealed_forecast_registry::InputVerifier)

pub mod authorization;
pub mod coprocessor;
pub mod crypto;
pub mod error;
pub mod traits;

pub use authorization::PublicAuthorization;
pub use coprocessor::LocalCoprocessor;
pub use crypto::{ReencryptionSecret, SealedValue, X25519PublicKey};
pub use error::{BackendError, Result};
pub use traits::{DecryptRequest, DecryptionBackend, EncryptedInput, EncryptionBackend};
