//! # Rollcall Sync
//!
//! The contact-discovery run: collect local numbers, look their hashes up in
//! the remote directory, and rebuild the synchronized contacts from the
//! answer.
//!
//! ## Components
//!
//! - [`Correlator`] - Matches out-of-band directory events to the waiting run
//! - [`DirectoryClient`] - Transport to the directory; answers via [`ResponseSink`]
//! - [`Synchronizer`] - The per-run state machine
//!
//! ## Safety
//!
//! A run only mutates the contact store when the directory's answer is known.
//! Errors, timeouts and cancellation leave the previous contacts in place.

pub mod correlator;
pub mod directory;
pub mod error;
pub mod synchronizer;

pub use correlator::{Correlator, PendingLookup, ResponseSink};
pub use directory::memory::MemoryDirectory;
pub use directory::DirectoryClient;
pub use error::{Result, SyncError};
pub use synchronizer::{
    Collaborators, SyncConfig, SyncPhase, Synchronizer, DEFAULT_LOOKUP_TIMEOUT,
    DEFAULT_MIN_NUMBER_DIGITS,
};
