//! # Sealed Forecast Store
//!
//! Storage abstraction for the registry ledger. Provides a trait-based
//! interface for committing signed transactions together with the owner
//! record mutation they cause, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`LedgerStore`] - The async trait for all storage operations
//! - [`SqliteLedger`] - SQLite-based persistent storage
//! - [`MemoryLedger`] - In-memory storage for tests
//! - [`LedgerEntry`] - One committed transaction
//! - [`CommitResult`] - Result of committing an entry
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sealed_forecast_store::{LedgerStore, SqliteLedger};
//!
//! async fn example() {
//!     let store = SqliteLedger::open("registry.db").unwrap();
//!     let head = store.head().await.unwrap();
//!     assert!(head.is_none());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic commits**: an entry and its record mutation land together or not at all
//! - **Idempotent commits**: committing a known transaction ID returns `AlreadyCommitted`
//! - **Conflict detection**: a different transaction at a taken position returns `Conflict`

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use traits::{CommitResult, LedgerEntry, LedgerHead, LedgerStore, LedgerStoreExt};
