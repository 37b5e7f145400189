//! Read-only access policy consulted by decryption backends.

use async_trait::async_trait;
use sealed_forecast_core::{AccountId, CiphertextHandle, RegistryAddress};

use crate::error::Result;

/// Who may decrypt what, as recorded by one registry.
#[async_trait]
pub trait AccessPolicy: Send + Sync {
    /// The registry this policy describes.
    fn address(&self) -> RegistryAddress;

    /// The owner whose current value is `handle`, if any.
    ///
    /// A handle replaced by a later submission no longer resolves.
    async fn owner_of(&self, handle: &CiphertextHandle) -> Result<Option<AccountId>>;

    /// `reader == owner || reader ∈ authorized_readers(owner)`.
    async fn is_authorized(&self, owner: &AccountId, reader: &AccountId) -> Result<bool>;
}
