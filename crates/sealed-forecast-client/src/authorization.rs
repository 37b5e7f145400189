//! Client-held decryption authorizations.

use sealed_forecast_backend::{PublicAuthorization, ReencryptionSecret, SealedValue};
use sealed_forecast_core::{AccountId, Keypair, RegistryAddress};

use crate::error::Result;

/// A decryption authorization together with its re-encryption secret.
///
/// The public half goes to the backend; the secret never leaves the client
/// and is redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Authorization {
    public: PublicAuthorization,
    secret: ReencryptionSecret,
}

impl Authorization {
    /// Issue a fresh authorization with a new re-encryption key pair.
    pub fn issue(keypair: &Keypair, scope: RegistryAddress, issued_at: i64, expires_at: i64) -> Self {
        let secret = ReencryptionSecret::generate();
        let public =
            PublicAuthorization::sign(keypair, secret.public_key(), scope, issued_at, expires_at);
        Self { public, secret }
    }

    /// Reassemble from parts.
    pub fn from_parts(public: PublicAuthorization, secret: ReencryptionSecret) -> Self {
        Self { public, secret }
    }

    pub fn signer(&self) -> AccountId {
        self.public.signer
    }

    pub fn scope(&self) -> RegistryAddress {
        self.public.scope
    }

    pub fn issued_at(&self) -> i64 {
        self.public.issued_at
    }

    pub fn expires_at(&self) -> i64 {
        self.public.expires_at
    }

    /// The part presented to a decryption backend.
    pub fn public(&self) -> &PublicAuthorization {
        &self.public
    }

    /// `issued_at <= now < expires_at`.
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.public.is_valid_at(now)
    }

    /// Open a value sealed to this authorization's re-encryption key.
    pub fn open(&self, sealed: &SealedValue) -> Result<u32> {
        Ok(sealed.open(&self.secret)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_open() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let scope = RegistryAddress::from_bytes([2; 32]);
        let auth = Authorization::issue(&keypair, scope, 0, 10);

        assert_eq!(auth.signer(), keypair.account());
        assert_eq!(auth.scope(), scope);
        assert!(auth.public().verify_signature());

        let sealed = SealedValue::seal(1672617600, &auth.public().reencryption_key).unwrap();
        assert_eq!(auth.open(&sealed).unwrap(), 1672617600);
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = Keypair::from_seed(&[1; 32]);
        let auth = Authorization::issue(&keypair, RegistryAddress::from_bytes([2; 32]), 0, 10);
        assert!(format!("{:?}", auth).contains("redacted"));
    }
}
