//! Sealing primitives: X25519 key agreement and ChaCha20-Poly1305.
//!
//! Decrypted values never travel in the clear. The backend seals each
//! plaintext to the re-encryption key named in the requester's
//! authorization, using a fresh ephemeral key per value.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{BackendError, Result};

/// Domain separation for keys derived from a shared secret.
const SEAL_KEY_CONTEXT: &str = "sealed-forecast-v0-reencryption";

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// The public half of a re-encryption key; named in authorizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    fn point(self) -> PublicKey {
        PublicKey::from(self.0)
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(point: PublicKey) -> Self {
        Self(point.to_bytes())
    }
}

/// The private half of a re-encryption key pair.
///
/// Lives only inside a client-side authorization. Debug output is redacted.
#[derive(Clone)]
pub struct ReencryptionSecret(StaticSecret);

impl ReencryptionSecret {
    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }

    /// Deterministic secret, for tests and fixtures.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        X25519PublicKey::from(PublicKey::from(&self.0))
    }

    fn agree(&self, peer: &X25519PublicKey) -> SymmetricKey {
        SymmetricKey::derive(self.0.diffie_hellman(&peer.point()).as_bytes())
    }
}

impl fmt::Debug for ReencryptionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReencryptionSecret(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealNonce(pub [u8; 12]);

impl SealNonce {
    pub fn generate() -> Self {
        Self(random_bytes())
    }
}

/// A ChaCha20-Poly1305 key. Debug output is redacted.
#[derive(Clone)]
pub struct SymmetricKey([u8; 32]);

impl SymmetricKey {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    fn derive(shared: &[u8; 32]) -> Self {
        Self(blake3::derive_key(SEAL_KEY_CONTEXT, shared))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|e| BackendError::Encryption(e.to_string()))
    }

    /// Fails on a wrong key or any tampering with `ciphertext`.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &SealNonce) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|e| BackendError::Decryption(e.to_string()))
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// A plaintext value sealed to one recipient.
///
/// Format: ephemeral X25519 public key, nonce, and the ChaCha20-Poly1305
/// ciphertext of the big-endian value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedValue {
    pub ephemeral_public: X25519PublicKey,
    pub nonce: SealNonce,
    pub ciphertext: Vec<u8>,
}

impl SealedValue {
    /// Seal `value` to `recipient`.
    pub fn seal(value: u32, recipient: &X25519PublicKey) -> Result<Self> {
        let ephemeral = EphemeralSecret::random_from_rng(rand::thread_rng());
        let ephemeral_public = PublicKey::from(&ephemeral).into();
        let key = SymmetricKey::derive(ephemeral.diffie_hellman(&recipient.point()).as_bytes());
        let nonce = SealNonce::generate();

        Ok(Self {
            ephemeral_public,
            nonce,
            ciphertext: key.encrypt(&value.to_be_bytes(), &nonce)?,
        })
    }

    /// Open with the recipient's secret.
    pub fn open(&self, secret: &ReencryptionSecret) -> Result<u32> {
        let key = secret.agree(&self.ephemeral_public);
        let bytes = key.decrypt(&self.ciphertext, &self.nonce)?;
        let arr: [u8; 4] = bytes.as_slice().try_into().map_err(|_| {
            BackendError::Decryption(format!("expected 4 plaintext bytes, got {}", bytes.len()))
        })?;
        Ok(u32::from_be_bytes(arr))
    }

    /// CBOR wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(96);
        ciborium::into_writer(self, &mut out)
            .map_err(|e| BackendError::Serialization(e.to_string()))?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| BackendError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let secret = ReencryptionSecret::generate();
        let sealed = SealedValue::seal(1672531200, &secret.public_key()).unwrap();
        assert_eq!(sealed.open(&secret).unwrap(), 1672531200);
    }

    #[test]
    fn test_zero_is_sealable() {
        let secret = ReencryptionSecret::from_bytes([7; 32]);
        let sealed = SealedValue::seal(0, &secret.public_key()).unwrap();
        assert_eq!(sealed.open(&secret).unwrap(), 0);
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let alice = ReencryptionSecret::generate();
        let eve = ReencryptionSecret::generate();
        let sealed = SealedValue::seal(42, &alice.public_key()).unwrap();
        assert!(matches!(sealed.open(&eve), Err(BackendError::Decryption(_))));
    }

    #[test]
    fn test_sealed_value_cbor() {
        let secret = ReencryptionSecret::generate();
        let sealed = SealedValue::seal(99, &secret.public_key()).unwrap();
        let decoded = SealedValue::from_bytes(&sealed.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, sealed);
        assert_eq!(decoded.open(&secret).unwrap(), 99);
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = ReencryptionSecret::from_bytes([0xAB; 32]);
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("171"));
        assert!(debug.contains("redacted"));
    }
}
