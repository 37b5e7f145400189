//! # Sealed Forecast
//!
//! Confidential per-account predictions. Each account stores one encrypted
//! value in a shared registry and decides who else may decrypt it.
//!
//! ## Overview
//!
//! - **Registry**: ledger-resident owner records (handle + authorized readers),
//!   mutated only by signed transactions from the owner
//! - **Coprocessor**: holds ciphertexts, verifies input proofs, and re-encrypts
//!   values for readers the registry authorizes
//! - **Client**: authorization cache and all-or-nothing decryption sessions
//! - **Forecast**: one user's session tying the above together, with a
//!   derived [`ForecastView`] for rendering
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sealed_forecast::{parse_date, ForecastConfig, LocalDeployment};
//! use sealed_forecast::client::KeypairSigner;
//! use sealed_forecast::core::Keypair;
//! use sealed_forecast::store::SqliteLedger;
//!
//! async fn example() -> sealed_forecast::Result<()> {
//!     let deployer = Keypair::generate();
//!     let store = SqliteLedger::open("forecast.db")?;
//!     let deployment = LocalDeployment::deploy(&deployer.account(), store, ForecastConfig::default())?;
//!
//!     let forecast = deployment.session();
//!     forecast
//!         .connect(Arc::new(KeypairSigner::new(Keypair::generate())), 1)
//!         .await?;
//!
//!     forecast
//!         .submit_prediction("SecretTGE", parse_date("2023-01-02")?)
//!         .await?;
//!     let value = forecast.decrypt_my_prediction().await?;
//!     assert_eq!(value, 1672617600);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sealed_forecast::core` - identifiers, keys, transactions
//! - `sealed_forecast::store` - ledger storage (memory and SQLite)
//! - `sealed_forecast::registry` - the encrypted value registry
//! - `sealed_forecast::backend` - coprocessor seams and the local stand-in
//! - `sealed_forecast::client` - authorization cache and decryption sessions

pub mod config;
pub mod dates;
pub mod error;
pub mod forecast;
pub mod local;

// Re-export component crates
pub use sealed_forecast_backend as backend;
pub use sealed_forecast_client as client;
pub use sealed_forecast_core as core;
pub use sealed_forecast_registry as registry;
pub use sealed_forecast_store as store;

pub use config::ForecastConfig;
pub use dates::{format_date, parse_date};
pub use error::{ForecastError, Result};
pub use forecast::{Forecast, ForecastView};
pub use local::LocalDeployment;

// Re-export commonly used types
pub use sealed_forecast_client::{ClientError, Signer, Status, StatusCategory};
pub use sealed_forecast_core::{AccountId, CiphertextHandle, Keypair, RegistryAddress};
pub use sealed_forecast_registry::TxOutcome;
