use thiserror::Error;

/// Failures surfaced by a [`LedgerStore`](crate::LedgerStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    /// An append would leave a gap after the current head.
    #[error("entry at seq {seq} does not extend head {head}")]
    NotContiguous { seq: u64, head: u64 },

    /// The on-disk schema cannot be used by this build.
    #[error("schema: {0}")]
    Migration(String),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// The `spawn_blocking` task running a query panicked or was aborted.
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
