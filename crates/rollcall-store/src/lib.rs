//! # Rollcall Store
//!
//! Storage abstraction for Rollcall. Provides trait-based interfaces for the
//! three stores a sync run touches, with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`ContactSource`] - Read-only address book the candidates come from
//! - [`ContactStore`] - Synchronized contacts, rebuilt atomically per run
//! - [`DirectoryMirror`] - Best-effort registration and status metadata
//! - [`SqliteStore`] - SQLite-based persistent storage implementing all three
//! - [`MemoryContactStore`], [`MemoryDirectoryMirror`], [`MemoryContactSource`] - for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rollcall_store::{ContactBatch, ContactStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("rollcall.db").unwrap();
//!
//!     let batch = ContactBatch { delete_all_synchronized: true, inserts: vec![] };
//!     let report = store.apply_batch("alice", &batch).await.unwrap();
//!     println!("removed {} contacts", report.deleted);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic batches**: `apply_batch` is all-or-nothing
//! - **Staged metadata**: mirror updates become visible on `commit`
//! - **Best-effort names**: display name resolution never fails

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryContactSource, MemoryContactStore, MemoryDirectoryMirror};
pub use sqlite::SqliteStore;
pub use traits::{
    BatchReport, ContactBatch, ContactSource, ContactStore, DirectoryMirror, DirectoryUser,
};
