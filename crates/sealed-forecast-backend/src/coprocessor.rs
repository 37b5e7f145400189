//! A local, deterministic stand-in for the encryption coprocessor.
//!
//! Plaintexts are encrypted under a master key held by the coprocessor.
//! A handle is the Blake3 hash of the stored ciphertext and its binding; the
//! input proof is a keyed Blake3 MAC over `(handle, owner, registry)`.
//! Decryption consults the registry's [`AccessPolicy`] and seals each value
//! to the requester's re-encryption key.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;

use sealed_forecast_core::{now_millis, AccountId, CiphertextHandle, RegistryAddress};
use sealed_forecast_registry::{AccessPolicy, InputVerifier};

use crate::authorization::PublicAuthorization;
use crate::crypto::{SealNonce, SealedValue, SymmetricKey};
use crate::error::{BackendError, Result};
use crate::traits::{DecryptRequest, DecryptionBackend, EncryptedInput, EncryptionBackend};

const HANDLE_CONTEXT: &str = "sealed-forecast-v0-handle";

struct StoredCiphertext {
    nonce: SealNonce,
    ciphertext: Vec<u8>,
    registry: RegistryAddress,
}

/// In-process coprocessor.
pub struct LocalCoprocessor {
    master_key: SymmetricKey,
    proof_key: [u8; 32],
    ciphertexts: RwLock<HashMap<CiphertextHandle, StoredCiphertext>>,
    policies: RwLock<HashMap<RegistryAddress, Arc<dyn AccessPolicy>>>,
    online: AtomicBool,
    latency: RwLock<Option<Duration>>,
}

impl LocalCoprocessor {
    /// Create a coprocessor with fresh random keys.
    pub fn new() -> Self {
        let mut proof_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut proof_key);
        Self::with_keys(SymmetricKey::generate(), proof_key)
    }

    /// Create a coprocessor with fixed keys.
    pub fn with_keys(master_key: SymmetricKey, proof_key: [u8; 32]) -> Self {
        Self {
            master_key,
            proof_key,
            ciphertexts: RwLock::new(HashMap::new()),
            policies: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            latency: RwLock::new(None),
        }
    }

    /// Register the access policy for a registry.
    pub fn attach_registry(&self, policy: Arc<dyn AccessPolicy>) -> Result<()> {
        let address = policy.address();
        self.policies
            .write()
            .map_err(|_| poisoned())?
            .insert(address, policy);
        tracing::debug!(registry = %address, "registry attached to coprocessor");
        Ok(())
    }

    /// Simulate the coprocessor going offline or coming back.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Delay every request by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) -> Result<()> {
        *self.latency.write().map_err(|_| poisoned())? = latency;
        Ok(())
    }

    /// Number of ciphertexts held.
    pub fn ciphertext_count(&self) -> Result<usize> {
        Ok(self.ciphertexts.read().map_err(|_| poisoned())?.len())
    }

    fn proof_for(&self, handle: &CiphertextHandle, owner: &AccountId, registry: &RegistryAddress) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.proof_key);
        hasher.update(handle.as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(registry.as_bytes());
        hasher.finalize()
    }

    async fn simulate_network(&self) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("coprocessor offline".into()));
        }
        let latency = *self.latency.read().map_err(|_| poisoned())?;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn policy_for(&self, scope: &RegistryAddress) -> Result<Arc<dyn AccessPolicy>> {
        self.policies
            .read()
            .map_err(|_| poisoned())?
            .get(scope)
            .cloned()
            .ok_or_else(|| BackendError::AuthorizationRejected(format!("unknown registry {}", scope)))
    }

    /// Fails with `MalformedHandle` unless a ciphertext was issued for
    /// `(handle, scope)`.
    fn ensure_known(&self, request: &DecryptRequest) -> Result<()> {
        let ciphertexts = self.ciphertexts.read().map_err(|_| poisoned())?;
        match ciphertexts.get(&request.handle) {
            Some(stored) if stored.registry == request.scope => Ok(()),
            _ => Err(BackendError::MalformedHandle(request.handle)),
        }
    }

    fn decrypt_stored(&self, request: &DecryptRequest) -> Result<u32> {
        let ciphertexts = self.ciphertexts.read().map_err(|_| poisoned())?;
        let stored = ciphertexts
            .get(&request.handle)
            .filter(|s| s.registry == request.scope)
            .ok_or(BackendError::MalformedHandle(request.handle))?;

        let bytes = self.master_key.decrypt(&stored.ciphertext, &stored.nonce)?;
        let arr: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| BackendError::Decryption("stored plaintext has wrong width".into()))?;
        Ok(u32::from_be_bytes(arr))
    }
}

impl Default for LocalCoprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> BackendError {
    BackendError::Unavailable("coprocessor state lock poisoned".into())
}

#[async_trait]
impl EncryptionBackend for LocalCoprocessor {
    async fn encrypt(
        &self,
        value: u32,
        owner: &AccountId,
        registry: &RegistryAddress,
    ) -> Result<EncryptedInput> {
        self.simulate_network().await?;

        let nonce = SealNonce::generate();
        let ciphertext = self.master_key.encrypt(&value.to_be_bytes(), &nonce)?;

        let mut hasher = blake3::Hasher::new_derive_key(HANDLE_CONTEXT);
        hasher.update(registry.as_bytes());
        hasher.update(owner.as_bytes());
        hasher.update(&nonce.0);
        hasher.update(&ciphertext);
        let handle = CiphertextHandle::from_bytes(*hasher.finalize().as_bytes());

        let proof = self.proof_for(&handle, owner, registry);

        self.ciphertexts.write().map_err(|_| poisoned())?.insert(
            handle,
            StoredCiphertext {
                nonce,
                ciphertext,
                registry: *registry,
            },
        );

        tracing::debug!(handle = %handle, owner = %owner, "value encrypted");
        Ok(EncryptedInput {
            handle,
            proof: Bytes::copy_from_slice(proof.as_bytes()),
        })
    }
}

impl InputVerifier for LocalCoprocessor {
    fn verify(
        &self,
        handle: &CiphertextHandle,
        proof: &[u8],
        owner: &AccountId,
        registry: &RegistryAddress,
    ) -> bool {
        let Ok(proof) = <[u8; 32]>::try_from(proof) else {
            return false;
        };
        // Constant-time comparison via blake3::Hash equality.
        self.proof_for(handle, owner, registry) == blake3::Hash::from(proof)
    }
}

#[async_trait]
impl DecryptionBackend for LocalCoprocessor {
    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        authorization: &PublicAuthorization,
    ) -> Result<HashMap<CiphertextHandle, SealedValue>> {
        self.simulate_network().await?;

        if !authorization.verify_signature() {
            return Err(BackendError::AuthorizationRejected("bad signature".into()));
        }
        if !authorization.is_valid_at(now_millis()) {
            return Err(BackendError::AuthorizationExpired);
        }

        let mut sealed = HashMap::with_capacity(requests.len());
        for request in requests {
            if request.scope != authorization.scope {
                return Err(BackendError::AuthorizationRejected(
                    "request outside authorization scope".into(),
                ));
            }

            // Unknown handles are a request error, not a verdict on the signer.
            self.ensure_known(request)?;

            let policy = self.policy_for(&request.scope)?;
            let owner = policy.owner_of(&request.handle).await?.ok_or_else(|| {
                BackendError::AuthorizationRejected(format!(
                    "handle {} is not a current registry value",
                    request.handle
                ))
            })?;

            if !policy.is_authorized(&owner, &authorization.signer).await? {
                tracing::warn!(
                    signer = %authorization.signer,
                    owner = %owner,
                    "decryption refused: signer not authorized"
                );
                return Err(BackendError::AuthorizationRejected(format!(
                    "{} may not read values of {}",
                    authorization.signer, owner
                )));
            }

            let value = self.decrypt_stored(request)?;
            sealed.insert(
                request.handle,
                SealedValue::seal(value, &authorization.reencryption_key)?,
            );
        }

        Ok(sealed)
    }
}
