//! The public half of a decryption authorization.
//!
//! A signer authorizes decryption for one registry scope over a validity
//! window by signing `(signer, reencryption key, scope, issued_at,
//! expires_at)`. The backend checks the signature and the window, then
//! seals plaintexts to the re-encryption key.

use ciborium::value::Value;
use sealed_forecast_core::{encode_canonical, AccountId, Keypair, RegistryAddress, Signature};

use crate::crypto::X25519PublicKey;

/// Domain tag mixed into the signed message.
const AUTHORIZATION_DOMAIN: &str = "sealed-forecast-authorization-v0";

/// Signed authorization as presented to a decryption backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicAuthorization {
    pub signer: AccountId,
    /// Key the backend seals plaintexts to.
    pub reencryption_key: X25519PublicKey,
    /// The registry whose values may be decrypted.
    pub scope: RegistryAddress,
    /// Start of validity (Unix ms, inclusive).
    pub issued_at: i64,
    /// End of validity (Unix ms, exclusive).
    pub expires_at: i64,
    /// Signer's signature over [`signing_bytes`](Self::signing_bytes).
    pub signature: Signature,
}

impl PublicAuthorization {
    /// Sign a new authorization.
    pub fn sign(
        keypair: &Keypair,
        reencryption_key: X25519PublicKey,
        scope: RegistryAddress,
        issued_at: i64,
        expires_at: i64,
    ) -> Self {
        let signer = keypair.account();
        let message = signing_bytes(&signer, &reencryption_key, &scope, issued_at, expires_at);
        Self {
            signer,
            reencryption_key,
            scope,
            issued_at,
            expires_at,
            signature: keypair.sign(&message),
        }
    }

    /// The canonical message covered by the signature.
    pub fn signing_bytes(&self) -> Vec<u8> {
        signing_bytes(
            &self.signer,
            &self.reencryption_key,
            &self.scope,
            self.issued_at,
            self.expires_at,
        )
    }

    /// Whether the signature verifies against `signer`.
    pub fn verify_signature(&self) -> bool {
        self.signer
            .verify(&self.signing_bytes(), &self.signature)
            .is_ok()
    }

    /// `issued_at <= now < expires_at`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.issued_at <= now && now < self.expires_at
    }
}

fn signing_bytes(
    signer: &AccountId,
    reencryption_key: &X25519PublicKey,
    scope: &RegistryAddress,
    issued_at: i64,
    expires_at: i64,
) -> Vec<u8> {
    let int = |n: u64| Value::Integer(n.into());
    encode_canonical(&Value::Map(vec![
        (int(0), Value::Text(AUTHORIZATION_DOMAIN.to_string())),
        (int(1), Value::Bytes(signer.as_bytes().to_vec())),
        (int(2), Value::Bytes(reencryption_key.as_bytes().to_vec())),
        (int(3), Value::Bytes(scope.as_bytes().to_vec())),
        (int(4), Value::Integer(issued_at.into())),
        (int(5), Value::Integer(expires_at.into())),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::ReencryptionSecret;

    fn scope() -> RegistryAddress {
        RegistryAddress::from_bytes([0x55; 32])
    }

    #[test]
    fn test_signed_authorization_verifies() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let auth = PublicAuthorization::sign(
            &keypair,
            ReencryptionSecret::generate().public_key(),
            scope(),
            1_000,
            2_000,
        );
        assert!(auth.verify_signature());
        assert!(auth.is_valid_at(1_000));
        assert!(auth.is_valid_at(1_999));
        assert!(!auth.is_valid_at(2_000));
        assert!(!auth.is_valid_at(999));
    }

    #[test]
    fn test_tampered_scope_fails() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let mut auth = PublicAuthorization::sign(
            &keypair,
            ReencryptionSecret::generate().public_key(),
            scope(),
            1_000,
            2_000,
        );
        auth.scope = RegistryAddress::from_bytes([0x66; 32]);
        assert!(!auth.verify_signature());
    }

    #[test]
    fn test_extended_expiry_fails() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let mut auth = PublicAuthorization::sign(
            &keypair,
            ReencryptionSecret::generate().public_key(),
            scope(),
            1_000,
            2_000,
        );
        auth.expires_at = i64::MAX;
        assert!(!auth.verify_signature());
    }
}
