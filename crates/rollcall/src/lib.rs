//! # Rollcall
//!
//! Contact discovery for messaging clients: find out which numbers in the
//! local address book belong to registered users, and keep a local list of
//! those contacts in sync with the remote directory.
//!
//! ## Overview
//!
//! A sync run reads the address book, normalizes and hashes every number,
//! sends the hashes to the directory in a single lookup, and rebuilds the
//! synchronized contacts from the answer in one atomic batch. Status and
//! last-seen metadata for matched users are mirrored best-effort.
//!
//! If the directory cannot be reached, errors, or does not answer in time,
//! the previous synchronized contacts are left untouched.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rollcall::{AccountContext, ContactDiscovery, DiscoveryConfig};
//! use rollcall::sync::MemoryDirectory;
//!
//! async fn example() {
//!     let directory = Arc::new(MemoryDirectory::default());
//!     let config = DiscoveryConfig::new(AccountContext::new("alice", "1"));
//!
//!     let discovery = ContactDiscovery::open("rollcall.db", config, directory).unwrap();
//!
//!     let outcome = discovery.sync_now().await.unwrap();
//!     if outcome.is_error() {
//!         // back off and retry later
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `rollcall::core` - Hashes, candidates, reconciliation
//! - `rollcall::store` - Store traits, SQLite and in-memory backends
//! - `rollcall::sync` - Correlator, directory client, synchronizer

pub mod discovery;
pub mod error;

// Re-export component crates
pub use rollcall_core as core;
pub use rollcall_store as store;
pub use rollcall_sync as sync;

pub use discovery::{ContactDiscovery, DiscoveryConfig};
pub use error::{DiscoveryError, Result};

// Re-export commonly used types
pub use rollcall_core::{AccountContext, PhoneHash, RunStatus, SyncOutcome};
pub use rollcall_sync::{Collaborators, SyncConfig};
