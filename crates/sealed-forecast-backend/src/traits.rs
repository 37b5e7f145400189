//! Backend seams.
//!
//! The homomorphic scheme itself is out of reach; the rest of the system
//! talks to it only through these traits.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use sealed_forecast_core::{AccountId, CiphertextHandle, RegistryAddress};

use crate::authorization::PublicAuthorization;
use crate::crypto::SealedValue;
use crate::error::Result;

/// An encrypted input ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handle: CiphertextHandle,
    /// Binds `handle` to the `(owner, registry)` it was encrypted for.
    pub proof: Bytes,
}

/// One handle to decrypt, under one registry scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecryptRequest {
    pub handle: CiphertextHandle,
    pub scope: RegistryAddress,
}

/// Produces ciphertext handles and input proofs.
#[async_trait]
pub trait EncryptionBackend: Send + Sync {
    /// Encrypt `value` for `owner` in `registry`.
    async fn encrypt(
        &self,
        value: u32,
        owner: &AccountId,
        registry: &RegistryAddress,
    ) -> Result<EncryptedInput>;
}

/// Re-encrypts stored values for authorized requesters.
#[async_trait]
pub trait DecryptionBackend: Send + Sync {
    /// Decrypt every request or none.
    ///
    /// Fails with `AuthorizationRejected` if the authorization is invalid or
    /// its signer may not read any of the handles, and with
    /// `AuthorizationExpired` outside the validity window.
    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        authorization: &PublicAuthorization,
    ) -> Result<HashMap<CiphertextHandle, SealedValue>>;
}
