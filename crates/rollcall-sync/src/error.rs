//! Error types for the sync module.

use std::time::Duration;

use thiserror::Error;

use rollcall_core::{LookupFailure, TransactionId};

/// Errors that can end a sync run.
///
/// A run never returns these to its caller; they are folded into the
/// [`SyncOutcome`](rollcall_core::SyncOutcome) counters and logged.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The lookup request could not be handed to the transport.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    /// A transaction id is already waiting for a response.
    #[error("transaction {0} is already pending")]
    DuplicateTransaction(TransactionId),

    /// The directory answered with an error or an unusable response.
    #[error("lookup failed: {0}")]
    Lookup(#[from] LookupFailure),

    /// No response arrived before the deadline.
    #[error("no directory response within {0:?}")]
    Timeout(Duration),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] rollcall_store::StoreError),

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
