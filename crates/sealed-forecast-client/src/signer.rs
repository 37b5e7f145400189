//! The signer seam: wallet-like approval of transactions and authorizations.

use std::time::Duration;

use async_trait::async_trait;
use sealed_forecast_core::{AccountId, Keypair, RegistryAddress, Transaction, TransactionBuilder};

use crate::authorization::Authorization;
use crate::error::{ClientError, Result};

/// Something that holds an account key and approves requests on its behalf.
///
/// `approve` may involve a human and can take arbitrarily long or be
/// declined; callers bound it with a timeout.
#[async_trait]
pub trait Signer: Send + Sync {
    fn account(&self) -> AccountId;

    /// Sign a registry transaction.
    async fn sign_transaction(&self, builder: TransactionBuilder) -> Result<Transaction>;

    /// Approve a decryption authorization for `scope`.
    async fn approve(
        &self,
        scope: RegistryAddress,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Authorization>;
}

/// A signer backed by an in-memory keypair.
///
/// Approves everything, optionally after a delay; can be switched to decline.
pub struct KeypairSigner {
    keypair: Keypair,
    approval_delay: Option<Duration>,
    decline: bool,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            approval_delay: None,
            decline: false,
        }
    }

    /// Wait `delay` before answering each approval.
    pub fn with_approval_delay(mut self, delay: Duration) -> Self {
        self.approval_delay = Some(delay);
        self
    }

    /// Decline every approval.
    pub fn declining(mut self) -> Self {
        self.decline = true;
        self
    }
}

#[async_trait]
impl Signer for KeypairSigner {
    fn account(&self) -> AccountId {
        self.keypair.account()
    }

    async fn sign_transaction(&self, builder: TransactionBuilder) -> Result<Transaction> {
        Ok(builder.sign(&self.keypair))
    }

    async fn approve(
        &self,
        scope: RegistryAddress,
        issued_at: i64,
        expires_at: i64,
    ) -> Result<Authorization> {
        if let Some(delay) = self.approval_delay {
            tokio::time::sleep(delay).await;
        }
        if self.decline {
            return Err(ClientError::ApprovalDenied);
        }
        Ok(Authorization::issue(&self.keypair, scope, issued_at, expires_at))
    }
}
