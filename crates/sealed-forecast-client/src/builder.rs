//! Encryption requests: plaintext in, `(handle, proof)` out.

use std::sync::Arc;

use sealed_forecast_backend::{BackendError, EncryptedInput, EncryptionBackend};
use sealed_forecast_core::{AccountId, RegistryAddress};

use crate::error::{ClientError, Result};

/// Builds encrypted inputs bound to an owner and a registry.
#[derive(Clone)]
pub struct EncryptionRequestBuilder {
    backend: Arc<dyn EncryptionBackend>,
}

impl EncryptionRequestBuilder {
    pub fn new(backend: Arc<dyn EncryptionBackend>) -> Self {
        Self { backend }
    }

    /// Encrypt `plaintext` for `owner` in `scope`.
    ///
    /// The returned proof is only accepted for that exact owner and registry.
    pub async fn build(
        &self,
        plaintext: u64,
        owner: &AccountId,
        scope: &RegistryAddress,
    ) -> Result<EncryptedInput> {
        let value = u32::try_from(plaintext).map_err(|_| ClientError::InvalidPlaintext(plaintext))?;

        match self.backend.encrypt(value, owner, scope).await {
            Ok(input) => Ok(input),
            Err(BackendError::Unavailable(msg)) => {
                Err(ClientError::EncryptionBackendUnavailable(msg))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_forecast_backend::LocalCoprocessor;
    use sealed_forecast_registry::InputVerifier;

    fn owner() -> AccountId {
        AccountId::from_bytes([1; 32])
    }

    fn scope() -> RegistryAddress {
        RegistryAddress::from_bytes([2; 32])
    }

    #[tokio::test]
    async fn test_build_binds_owner_and_scope() {
        let coprocessor = Arc::new(LocalCoprocessor::new());
        let builder = EncryptionRequestBuilder::new(coprocessor.clone());

        let input = builder.build(1672531200, &owner(), &scope()).await.unwrap();
        assert!(!input.handle.is_empty());
        assert!(coprocessor.verify(&input.handle, &input.proof, &owner(), &scope()));
        assert!(!coprocessor.verify(&input.handle, &input.proof, &AccountId::from_bytes([3; 32]), &scope()));
    }

    #[tokio::test]
    async fn test_plaintext_range() {
        let builder = EncryptionRequestBuilder::new(Arc::new(LocalCoprocessor::new()));

        assert!(builder.build(u32::MAX as u64, &owner(), &scope()).await.is_ok());
        assert!(matches!(
            builder.build(u32::MAX as u64 + 1, &owner(), &scope()).await,
            Err(ClientError::InvalidPlaintext(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_unavailable() {
        let coprocessor = Arc::new(LocalCoprocessor::new());
        coprocessor.set_online(false);
        let builder = EncryptionRequestBuilder::new(coprocessor);

        assert!(matches!(
            builder.build(1, &owner(), &scope()).await,
            Err(ClientError::EncryptionBackendUnavailable(_))
        ));
    }
}
