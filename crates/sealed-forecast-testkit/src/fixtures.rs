//! Test fixtures and helpers.
//!
//! Common setup code for unit and integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use sealed_forecast_backend::{DecryptRequest, LocalCoprocessor};
use sealed_forecast_client::{
    AuthorizationCache, DecryptionConfig, DecryptionOrchestrator, EncryptionRequestBuilder,
    KeypairSigner, LedgerClient, LocalLedgerClient, Result,
};
use sealed_forecast_core::{
    AccountId, CiphertextHandle, Keypair, RegistryAddress, Transaction, TransactionBuilder,
};
use sealed_forecast_registry::{EncryptedValueRegistry, RegistryConfig, TxOutcome};
use sealed_forecast_store::MemoryLedger;
use tracing_subscriber::filter::LevelFilter;

/// Install a test-friendly subscriber. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(LevelFilter::DEBUG)
        .try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Parties
// ─────────────────────────────────────────────────────────────────────────────

/// A named account with a deterministic keypair.
#[derive(Debug, Clone)]
pub struct Party {
    pub name: &'static str,
    pub keypair: Keypair,
}

impl Party {
    pub fn new(name: &'static str, seed: u8) -> Self {
        Self {
            name,
            keypair: Keypair::from_seed(&[seed; 32]),
        }
    }

    pub fn account(&self) -> AccountId {
        self.keypair.account()
    }

    /// A signer that approves everything immediately.
    pub fn signer(&self) -> Arc<KeypairSigner> {
        Arc::new(KeypairSigner::new(self.keypair.clone()))
    }
}

pub fn alice() -> Party {
    Party::new("alice", 0xA1)
}

pub fn bob() -> Party {
    Party::new("bob", 0xB0)
}

pub fn carol() -> Party {
    Party::new("carol", 0xC0)
}

/// The account every fixture registry is deployed from.
pub fn deployer() -> Party {
    Party::new("deployer", 0xDE)
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory registry wired to a local coprocessor.
///
/// Submissions go through the client's encryption builder and ledger client,
/// so they cross the same seams a real front end would.
pub struct TestRegistry {
    pub coprocessor: Arc<LocalCoprocessor>,
    pub registry: Arc<EncryptedValueRegistry<MemoryLedger>>,
    ledger: LocalLedgerClient<MemoryLedger>,
    encryption: EncryptionRequestBuilder,
    nonce: AtomicU64,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let coprocessor = Arc::new(LocalCoprocessor::new());
        let registry = Arc::new(EncryptedValueRegistry::deploy(
            &deployer().account(),
            MemoryLedger::new(),
            coprocessor.clone(),
            config,
        ));
        // A fresh coprocessor lock cannot be poisoned.
        let _ = coprocessor.attach_registry(registry.clone());

        Self {
            ledger: LocalLedgerClient::new(registry.clone()),
            encryption: EncryptionRequestBuilder::new(coprocessor.clone()),
            coprocessor,
            registry,
            nonce: AtomicU64::new(1),
        }
    }

    pub fn address(&self) -> RegistryAddress {
        self.registry.address()
    }

    pub fn ledger(&self) -> &LocalLedgerClient<MemoryLedger> {
        &self.ledger
    }

    /// Sign `builder` as `party` with a fresh nonce.
    pub fn sign(&self, party: &Party, builder: TransactionBuilder) -> Transaction {
        builder
            .nonce(self.nonce.fetch_add(1, Ordering::SeqCst))
            .sign(&party.keypair)
    }

    /// Encrypt `value` for `party` and submit it. Returns the new handle.
    pub async fn submit(&self, party: &Party, value: u64) -> Result<CiphertextHandle> {
        let input = self
            .encryption
            .build(value, &party.account(), &self.address())
            .await?;
        let tx = self.sign(
            party,
            TransactionBuilder::submit(self.address(), input.handle, input.proof),
        );
        self.ledger.send_transaction(&tx).await?;
        Ok(input.handle)
    }

    pub async fn grant(&self, owner: &Party, reader: &Party) -> Result<TxOutcome> {
        let tx = self.sign(owner, TransactionBuilder::grant(self.address(), reader.account()));
        self.ledger.send_transaction(&tx).await
    }

    pub async fn revoke(&self, owner: &Party, reader: &Party) -> Result<TxOutcome> {
        let tx = self.sign(owner, TransactionBuilder::revoke(self.address(), reader.account()));
        self.ledger.send_transaction(&tx).await
    }

    pub async fn has_value(&self, party: &Party) -> bool {
        self.ledger.has_value(&party.account()).await.unwrap_or(false)
    }

    pub async fn value_of(&self, party: &Party) -> CiphertextHandle {
        self.ledger
            .value_of(&party.account())
            .await
            .unwrap_or(CiphertextHandle::EMPTY)
    }

    pub async fn is_authorized(&self, owner: &Party, reader: &Party) -> bool {
        self.registry
            .is_authorized(&owner.account(), &reader.account())
            .await
            .unwrap_or(false)
    }

    /// A decryption request for `handle` scoped to this registry.
    pub fn request(&self, handle: CiphertextHandle) -> DecryptRequest {
        DecryptRequest {
            handle,
            scope: self.address(),
        }
    }

    /// An orchestrator backed by this registry's coprocessor, with its own cache.
    pub fn orchestrator(&self, config: DecryptionConfig) -> DecryptionOrchestrator {
        DecryptionOrchestrator::new(
            self.coprocessor.clone(),
            Arc::new(AuthorizationCache::new()),
            config,
        )
    }
}

impl Default for TestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
