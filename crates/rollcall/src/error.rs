//! Error types for the discovery API.

use rollcall_store::StoreError;
use thiserror::Error;

/// Errors that can occur before a sync run starts.
///
/// Failures inside a run are reported through
/// [`SyncOutcome`](rollcall_core::SyncOutcome), never as errors.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Another run for this account is still in progress.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
