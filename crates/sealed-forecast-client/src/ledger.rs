//! Client view of a registry ledger.

use std::sync::Arc;

use async_trait::async_trait;
use sealed_forecast_core::{canonical_bytes, AccountId, CiphertextHandle, RegistryAddress, Transaction};
use sealed_forecast_registry::{EncryptedValueRegistry, TxOutcome};
use sealed_forecast_store::LedgerStore;

use crate::error::Result;

/// Registry entry points as a client reaches them.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The registry this client talks to.
    fn registry(&self) -> RegistryAddress;

    /// Submit a signed transaction and wait for it to be committed.
    async fn send_transaction(&self, tx: &Transaction) -> Result<TxOutcome>;

    async fn has_value(&self, account: &AccountId) -> Result<bool>;

    async fn value_of(&self, account: &AccountId) -> Result<CiphertextHandle>;
}

/// A ledger client for an in-process registry.
///
/// Transactions cross as canonical bytes, the same way they would over a wire.
pub struct LocalLedgerClient<S: LedgerStore> {
    registry: Arc<EncryptedValueRegistry<S>>,
}

impl<S: LedgerStore> LocalLedgerClient<S> {
    pub fn new(registry: Arc<EncryptedValueRegistry<S>>) -> Self {
        Self { registry }
    }
}

impl<S: LedgerStore> Clone for LocalLedgerClient<S> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

#[async_trait]
impl<S: LedgerStore + 'static> LedgerClient for LocalLedgerClient<S> {
    fn registry(&self) -> RegistryAddress {
        self.registry.address()
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<TxOutcome> {
        let bytes = canonical_bytes(tx);
        Ok(self.registry.execute_bytes(&bytes).await?)
    }

    async fn has_value(&self, account: &AccountId) -> Result<bool> {
        Ok(self.registry.has_value(account).await?)
    }

    async fn value_of(&self, account: &AccountId) -> Result<CiphertextHandle> {
        Ok(self.registry.value_of(account).await?)
    }
}
