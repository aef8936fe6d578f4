//! Store errors.

use thiserror::Error;

/// Why a store operation failed.
///
/// The synchronizer does not distinguish between variants: any of them on
/// the contact store is a database error for the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The backend refused the operation (provider gone, injected fault).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The on-disk schema is newer than this build, or a step is missing.
    #[error("schema: {0}")]
    Schema(String),

    /// The blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
