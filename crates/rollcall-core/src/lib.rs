//! # Rollcall Core
//!
//! Pure primitives for Rollcall: phone hashes, candidates, lookup outcomes and
//! the reconciliation engine.
//!
//! This crate contains no I/O, no storage, no networking. Everything here can
//! be exercised without a runtime.
//!
//! ## Key Types
//!
//! - [`PhoneHash`] - Privacy-preserving key a number is known by (Blake3)
//! - [`CandidateSet`] - The deduplicated local numbers of one run
//! - [`LookupResult`] - Terminal outcome of one directory lookup
//! - [`ReconciliationPlan`] - The store mutation computed by [`reconcile`]
//! - [`SyncOutcome`] - Counters reported back to the scheduler

pub mod candidate;
pub mod error;
pub mod lookup;
pub mod normalize;
pub mod outcome;
pub mod reconcile;
pub mod types;

pub use candidate::{CandidateEntry, CandidateSet, RawCandidate};
pub use error::{CoreError, InvalidNumber, LookupFailure};
pub use lookup::{LookupRequest, LookupResponse, LookupResult, MatchEntry};
pub use normalize::{digit_count, E164Normalizer, KeyNormalizer};
pub use outcome::{RunStatus, SyncOutcome};
pub use reconcile::{reconcile, ContactInsert, ReconciliationPlan, StatusUpdate};
pub use types::{AccountContext, LookupKey, PhoneHash, TransactionId};
