//! An in-process deployment: one registry plus the local coprocessor.

use std::sync::Arc;

use sealed_forecast_backend::LocalCoprocessor;
use sealed_forecast_client::{ClientError, LocalLedgerClient};
use sealed_forecast_core::{AccountId, RegistryAddress};
use sealed_forecast_registry::EncryptedValueRegistry;
use sealed_forecast_store::LedgerStore;

use crate::config::ForecastConfig;
use crate::error::Result;
use crate::forecast::Forecast;

/// A registry wired to a [`LocalCoprocessor`] that verifies its inputs and
/// consults it before decrypting.
pub struct LocalDeployment<S: LedgerStore> {
    registry: Arc<EncryptedValueRegistry<S>>,
    coprocessor: Arc<LocalCoprocessor>,
    config: ForecastConfig,
}

impl<S: LedgerStore + 'static> LocalDeployment<S> {
    /// Deploy `config.registry.name` from `deployer` over `store`.
    ///
    /// Deploying again with the same deployer, name, and store yields the
    /// same address and state.
    pub fn deploy(deployer: &AccountId, store: S, config: ForecastConfig) -> Result<Self> {
        Self::with_coprocessor(deployer, store, Arc::new(LocalCoprocessor::new()), config)
    }

    /// Deploy against an existing coprocessor.
    pub fn with_coprocessor(
        deployer: &AccountId,
        store: S,
        coprocessor: Arc<LocalCoprocessor>,
        config: ForecastConfig,
    ) -> Result<Self> {
        let registry = Arc::new(EncryptedValueRegistry::deploy(
            deployer,
            store,
            coprocessor.clone(),
            config.registry.clone(),
        ));
        coprocessor
            .attach_registry(registry.clone())
            .map_err(ClientError::from)?;

        Ok(Self {
            registry,
            coprocessor,
            config,
        })
    }

    pub fn address(&self) -> RegistryAddress {
        self.registry.address()
    }

    pub fn registry(&self) -> &Arc<EncryptedValueRegistry<S>> {
        &self.registry
    }

    pub fn coprocessor(&self) -> &Arc<LocalCoprocessor> {
        &self.coprocessor
    }

    /// A fresh, disconnected session against this deployment.
    ///
    /// Each session has its own authorization cache and result set.
    pub fn session(&self) -> Forecast {
        Forecast::new(
            Arc::new(LocalLedgerClient::new(self.registry.clone())),
            self.coprocessor.clone(),
            self.coprocessor.clone(),
            self.config.clone(),
        )
    }
}
