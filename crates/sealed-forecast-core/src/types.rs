//! Strong type definitions for Sealed Forecast.
//!
//! All identifiers are newtypes to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::AccountId;
use crate::error::CoreError;

/// Shared impls for the 32-byte identifier newtypes.
macro_rules! bytes32_newtype {
    ($name:ident, $label:literal) => {
        impl $name {
            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, CoreError> {
                let trimmed = s.strip_prefix("0x").unwrap_or(s);
                let bytes =
                    hex::decode(trimmed).map_err(|e| CoreError::DecodingError(e.to_string()))?;
                Self::try_from(bytes.as_slice())
            }

            /// The all-zero value.
            pub const ZERO: Self = Self([0u8; 32]);
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", &self.to_hex()[..16])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = CoreError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice.try_into().map_err(|_| {
                    CoreError::DecodingError(format!(
                        concat!($label, " must be 32 bytes, got {}"),
                        slice.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }
    };
}

/// A 32-byte Blake3 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

bytes32_newtype!(Blake3Hash, "Blake3");

impl Blake3Hash {
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

/// An opaque reference to a ciphertext held by the encryption backend.
///
/// Nothing in this workspace inspects the bytes of a handle; handles are only
/// compared for equality and emptiness. The all-zero handle means "no value".
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CiphertextHandle(pub [u8; 32]);

bytes32_newtype!(CiphertextHandle, "Handle");

impl CiphertextHandle {
    /// The empty handle: no submission yet.
    pub const EMPTY: Self = Self::ZERO;

    /// Whether this is the empty handle.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl Default for CiphertextHandle {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A 32-byte transaction identifier, computed as Blake3(canonical_bytes(tx)).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId(pub [u8; 32]);

bytes32_newtype!(TxId, "TxId");

/// The address of a deployed registry instance.
///
/// Used as the scope of ciphertext proofs and decryption authorizations:
/// a proof or authorization issued for one registry is worthless at another.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegistryAddress(pub [u8; 32]);

bytes32_newtype!(RegistryAddress, "Registry");

impl RegistryAddress {
    /// Derive a registry address from its deployer and contract name.
    ///
    /// Deterministic, so redeploying the same name from the same deployer
    /// yields the same address.
    pub fn derive(deployer: &AccountId, name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"sealed-forecast-registry-v0:");
        hasher.update(&deployer.0);
        hasher.update(b":");
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    #[test]
    fn test_handle_emptiness() {
        assert!(CiphertextHandle::EMPTY.is_empty());
        assert!(CiphertextHandle::default().is_empty());
        assert!(!CiphertextHandle::from_bytes([0x01; 32]).is_empty());
    }

    #[test]
    fn test_handle_hex_roundtrip() {
        let handle = CiphertextHandle::from_bytes([0x42; 32]);
        let recovered = CiphertextHandle::from_hex(&format!("0x{}", handle.to_hex())).unwrap();
        assert_eq!(handle, recovered);
    }

    #[test]
    fn test_short_handle_rejected() {
        assert!(CiphertextHandle::try_from(&[0u8; 31][..]).is_err());
    }

    #[test]
    fn test_tx_id_display() {
        let id = TxId::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", id), "0xabababababababab");
        assert!(format!("{:?}", id).starts_with("TxId("));
    }

    #[test]
    fn test_registry_address_derivation() {
        let deployer = Keypair::from_seed(&[7; 32]).account();
        let other = Keypair::from_seed(&[8; 32]).account();

        let a1 = RegistryAddress::derive(&deployer, "FHESecretTGE");
        let a2 = RegistryAddress::derive(&deployer, "FHESecretTGE");
        assert_eq!(a1, a2);

        assert_ne!(a1, RegistryAddress::derive(&other, "FHESecretTGE"));
        assert_ne!(a1, RegistryAddress::derive(&deployer, "OtherRegistry"));
    }
}
