//! Request correlation: turning out-of-band, id-tagged directory events into
//! a single awaitable result.
//!
//! The waiter registers a one-shot slot for its transaction id *before* the
//! request is sent. Whoever delivers the first event for that id removes the
//! slot and fills it; every later event for the id finds no slot and is
//! dropped. Dropping the waiter (timeout, cancellation, or simply returning)
//! removes the slot as well, so nothing can be delivered after the waiter is
//! gone and no listener outlives its run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use rollcall_core::{LookupFailure, LookupResponse, LookupResult, MatchEntry, TransactionId};

use crate::error::{Result, SyncError};

type Slots = HashMap<TransactionId, oneshot::Sender<LookupResult>>;

/// Routes directory events to the run waiting for them.
///
/// Cheap to clone; clones share the same pending table.
#[derive(Clone, Default)]
pub struct Correlator {
    pending: Arc<Mutex<Slots>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `transaction_id`.
    ///
    /// Must be called before the request is dispatched; an event delivered
    /// between registration and [`PendingLookup::wait`] is buffered.
    pub fn register(&self, transaction_id: TransactionId) -> Result<PendingLookup> {
        let (tx, rx) = oneshot::channel();

        let mut pending = self.lock();
        if pending.contains_key(&transaction_id) {
            return Err(SyncError::DuplicateTransaction(transaction_id));
        }
        pending.insert(transaction_id, tx);

        Ok(PendingLookup {
            transaction_id,
            rx,
            correlator: self.clone(),
        })
    }

    /// A delivery handle for directory clients.
    pub fn sink(&self) -> ResponseSink {
        ResponseSink {
            correlator: self.clone(),
        }
    }

    /// Number of transactions currently waiting.
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    /// Resolve `transaction_id` with `result`.
    ///
    /// Returns false if the id is unknown or already resolved.
    fn resolve(&self, transaction_id: &TransactionId, result: LookupResult) -> bool {
        let slot = self.lock().remove(transaction_id);
        match slot {
            Some(tx) => tx.send(result).is_ok(),
            None => {
                tracing::debug!(
                    transaction = %transaction_id,
                    "discarding event for unknown or resolved transaction"
                );
                false
            }
        }
    }

    fn unregister(&self, transaction_id: &TransactionId) {
        self.lock().remove(transaction_id);
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Where a directory client reports the outcome of a lookup.
///
/// Safe to call from any thread. Each method returns whether the event was
/// accepted; only the first event for a transaction id is.
#[derive(Clone)]
pub struct ResponseSink {
    correlator: Correlator,
}

impl ResponseSink {
    /// Report a decoded match list.
    pub fn on_result(&self, transaction_id: &TransactionId, entries: Vec<MatchEntry>) -> bool {
        self.correlator
            .resolve(transaction_id, LookupResult::Matched { entries })
    }

    /// Report an encoded [`LookupResponse`].
    ///
    /// A payload that does not decode resolves the lookup as failed; partial
    /// match lists are never surfaced.
    pub fn on_payload(&self, transaction_id: &TransactionId, payload: &[u8]) -> bool {
        let result = match LookupResponse::from_bytes(payload) {
            Ok(response) => LookupResult::Matched {
                entries: response.entries,
            },
            Err(e) => LookupResult::Failed { cause: e.into() },
        };
        self.correlator.resolve(transaction_id, result)
    }

    /// Report a directory error.
    pub fn on_error(&self, transaction_id: &TransactionId, cause: impl Into<String>) -> bool {
        self.correlator.resolve(
            transaction_id,
            LookupResult::Failed {
                cause: LookupFailure::Directory(cause.into()),
            },
        )
    }
}

/// A registered lookup waiting for its single terminal event.
pub struct PendingLookup {
    transaction_id: TransactionId,
    rx: oneshot::Receiver<LookupResult>,
    correlator: Correlator,
}

impl PendingLookup {
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Wait for the response, the deadline or cancellation, whichever is first.
    ///
    /// Consumes the registration: once this returns, later events for the
    /// transaction are discarded.
    pub async fn wait(mut self, timeout: Duration, cancel: &CancellationToken) -> LookupResult {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => LookupResult::Canceled,
            received = &mut self.rx => match received {
                Ok(result) => result,
                Err(_) => LookupResult::Failed {
                    cause: LookupFailure::Disconnected,
                },
            },
            _ = tokio::time::sleep(timeout) => LookupResult::TimedOut,
        }
    }
}

impl Drop for PendingLookup {
    fn drop(&mut self) {
        self.correlator.unregister(&self.transaction_id);
    }
}
