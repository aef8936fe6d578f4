//! Directory client abstraction.
//!
//! A directory client sends a batch of phone hashes to the remote directory.
//! The answer never comes back as the return value of the send: it arrives
//! later, possibly on a thread the caller does not control, through the
//! [`ResponseSink`] handed to the client.

use async_trait::async_trait;

use rollcall_core::LookupRequest;

use crate::correlator::ResponseSink;
use crate::error::Result;

/// Transport to the remote user directory.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Hand `request` to the transport.
    ///
    /// `Ok` only means the request was accepted for delivery. The response,
    /// or an error, is reported through `sink` using the request's
    /// transaction id. A client may report synchronously, before this
    /// method returns.
    async fn dispatch_lookup(&self, request: &LookupRequest, sink: ResponseSink) -> Result<()>;
}

/// An in-process directory for tests and local wiring.
///
/// Answers each lookup from a background thread after a configurable
/// latency, encoding the response exactly like a remote directory would.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{PoisonError, RwLock};
    use std::time::Duration;

    use rollcall_core::{LookupResponse, MatchEntry, PhoneHash};

    use crate::error::SyncError;

    /// Registered users keyed by phone hash.
    pub struct MemoryDirectory {
        users: RwLock<HashMap<PhoneHash, MatchEntry>>,
        latency: Duration,
        available: AtomicBool,
        lookups: AtomicUsize,
    }

    impl MemoryDirectory {
        /// Create an empty directory answering after `latency`.
        pub fn new(latency: Duration) -> Self {
            Self {
                users: RwLock::new(HashMap::new()),
                latency,
                available: AtomicBool::new(true),
                lookups: AtomicUsize::new(0),
            }
        }

        /// Register a user under the hash of `normalized_number`.
        pub fn register(&self, normalized_number: &str) -> PhoneHash {
            let hash = PhoneHash::derive(normalized_number);
            self.register_entry(MatchEntry::new(hash));
            hash
        }

        /// Register a user with explicit metadata.
        pub fn register_entry(&self, entry: MatchEntry) {
            self.users
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(entry.hash, entry);
        }

        /// Make the transport refuse new requests.
        pub fn set_available(&self, available: bool) {
            self.available.store(available, Ordering::SeqCst);
        }

        /// Number of lookups accepted so far.
        pub fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        fn matches(&self, hashes: &[PhoneHash]) -> Vec<MatchEntry> {
            let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
            hashes
                .iter()
                .filter_map(|hash| users.get(hash).cloned())
                .collect()
        }
    }

    impl Default for MemoryDirectory {
        fn default() -> Self {
            Self::new(Duration::ZERO)
        }
    }

    #[async_trait]
    impl DirectoryClient for MemoryDirectory {
        async fn dispatch_lookup(&self, request: &LookupRequest, sink: ResponseSink) -> Result<()> {
            if !self.available.load(Ordering::SeqCst) {
                return Err(SyncError::TransportUnavailable(
                    "directory is not reachable".into(),
                ));
            }
            self.lookups.fetch_add(1, Ordering::SeqCst);

            let transaction_id = request.transaction_id;
            let payload = LookupResponse::new(self.matches(&request.hashes))
                .to_bytes()
                .map_err(|e| SyncError::TransportUnavailable(e.to_string()))?;
            let latency = self.latency;

            std::thread::spawn(move || {
                if !latency.is_zero() {
                    std::thread::sleep(latency);
                }
                sink.on_payload(&transaction_id, &payload);
            });

            Ok(())
        }
    }
}
