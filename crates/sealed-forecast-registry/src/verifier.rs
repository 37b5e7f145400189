//! The input verifier seam.
//!
//! A submission's proof must bind its handle to the submitting owner and the
//! registry. The registry does not know how proofs are built; it asks an
//! [`InputVerifier`], normally the encryption backend that issued the handle.

use std::sync::Arc;

use sealed_forecast_core::{AccountId, CiphertextHandle, RegistryAddress};

/// Checks that `proof` binds `handle` to `(owner, registry)`.
pub trait InputVerifier: Send + Sync {
    fn verify(
        &self,
        handle: &CiphertextHandle,
        proof: &[u8],
        owner: &AccountId,
        registry: &RegistryAddress,
    ) -> bool;
}

impl<T: InputVerifier + ?Sized> InputVerifier for Arc<T> {
    fn verify(
        &self,
        handle: &CiphertextHandle,
        proof: &[u8],
        owner: &AccountId,
        registry: &RegistryAddress,
    ) -> bool {
        (**self).verify(handle, proof, owner, registry)
    }
}

/// Accepts every proof. For tests of the permission state machine only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl InputVerifier for AcceptAll {
    fn verify(&self, _: &CiphertextHandle, _: &[u8], _: &AccountId, _: &RegistryAddress) -> bool {
        true
    }
}
