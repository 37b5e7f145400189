//! Cryptographic primitives for Sealed Forecast.
//!
//! Ed25519 signing with strong types. Accounts are identified by their
//! Ed25519 public key.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// An account: the 32-byte Ed25519 public key of its holder.
///
/// Owners, readers, and authorization signers are all accounts.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string, with or without a `0x` prefix.
    ///
    /// This is the only way a malformed account reaches the registry
    /// query surface, so it is the only place that can fail on one.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed).map_err(|e| CoreError::MalformedAccount(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            CoreError::MalformedAccount(format!("expected 32 bytes, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }

    /// Verify a signature over a message made by this account.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Account({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", &self.to_hex()[..16])
    }
}

impl AsRef<[u8]> for AccountId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    /// All zeroes. Never verifies.
    pub const ZERO: Self = Self([0u8; 64]);
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 64]>::try_from(slice)
            .map(Self)
            .map_err(|_| CoreError::InvalidSignature)
    }
}

/// A wallet key. Signs registry transactions and authorization requests.
#[derive(Clone)]
pub struct Keypair {
    secret: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(seed),
        }
    }

    /// The account controlled by this keypair.
    pub fn account(&self) -> AccountId {
        AccountId(self.secret.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.secret.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({:?})", self.account())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_covers_every_byte() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"submit prediction");

        assert!(keypair.account().verify(b"submit prediction", &signature).is_ok());
        assert!(keypair.account().verify(b"submit predictioN", &signature).is_err());
    }

    #[test]
    fn test_seeded_keys_are_stable() {
        assert_eq!(
            Keypair::from_seed(&[0x42; 32]).account(),
            Keypair::from_seed(&[0x42; 32]).account()
        );
        assert!(Signature::try_from(&[0u8; 63][..]).is_err());
    }

    #[test]
    fn test_account_hex_roundtrip_with_prefix() {
        let account = Keypair::generate().account();
        let prefixed = format!("0x{}", account.to_hex());

        assert_eq!(AccountId::from_hex(&account.to_hex()).unwrap(), account);
        assert_eq!(AccountId::from_hex(&prefixed).unwrap(), account);
    }

    #[test]
    fn test_malformed_account_rejected() {
        assert!(matches!(
            AccountId::from_hex("0x1234"),
            Err(CoreError::MalformedAccount(_))
        ));
        assert!(matches!(
            AccountId::from_hex("not-hex"),
            Err(CoreError::MalformedAccount(_))
        ));
    }

    #[test]
    fn test_wrong_signer_fails() {
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let signature = alice.sign(b"grant");

        assert!(bob.account().verify(b"grant", &signature).is_err());
    }
}
