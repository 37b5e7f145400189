//! # Sealed Forecast Testkit
//!
//! Testing utilities for Sealed Forecast.
//!
//! ## Overview
//!
//! - **Fixtures**: deterministic parties and an in-memory registry wired to a
//!   local coprocessor
//! - **Generators**: proptest strategies for accounts, handles, predictions,
//!   and registry operation sequences
//! - **Tracing**: a one-call subscriber for test output
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use sealed_forecast_testkit::fixtures::{alice, TestRegistry};
//!
//! async fn example() {
//!     let registry = TestRegistry::new();
//!     registry.submit(&alice(), 1672531200).await.unwrap();
//!     assert!(registry.has_value(&alice()).await);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sealed_forecast_testkit::generators::registry_ops;
//!
//! proptest! {
//!     #[test]
//!     fn grants_converge(ops in registry_ops(3, 32)) {
//!         // replay `ops` against a registry and a model
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{alice, bob, carol, deployer, init_tracing, Party, TestRegistry};
pub use generators::{RegistryOp, registry_ops};
