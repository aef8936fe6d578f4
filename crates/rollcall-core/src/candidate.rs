//! Candidates: local phone numbers considered for one directory lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{LookupKey, PhoneHash};

/// A phone number as read from the contact source, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub raw_number: String,
    pub lookup_key: LookupKey,
}

impl RawCandidate {
    pub fn new(raw_number: impl Into<String>, lookup_key: impl Into<LookupKey>) -> Self {
        Self {
            raw_number: raw_number.into(),
            lookup_key: lookup_key.into(),
        }
    }
}

/// One normalized, hashed candidate of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEntry {
    pub lookup_key: LookupKey,
    pub raw_number: String,
    pub normalized_number: String,
    pub hash: PhoneHash,
}

impl CandidateEntry {
    /// Build an entry from a normalized number, deriving its hash.
    pub fn new(lookup_key: LookupKey, raw_number: String, normalized_number: String) -> Self {
        let hash = PhoneHash::derive(&normalized_number);
        Self {
            lookup_key,
            raw_number,
            normalized_number,
            hash,
        }
    }
}

/// The deduplicated candidates of one run, keyed by hash.
///
/// Hashes keep first-seen order so the dispatched hash list is reproducible.
/// When two contacts share a number the later one becomes the representative;
/// the other lookup keys are not tracked.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    entries: HashMap<PhoneHash, CandidateEntry>,
    order: Vec<PhoneHash>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `true` if its hash was not present yet.
    pub fn insert(&mut self, entry: CandidateEntry) -> bool {
        let hash = entry.hash;
        let is_new = self.entries.insert(hash, entry).is_none();
        if is_new {
            self.order.push(hash);
        }
        is_new
    }

    pub fn get(&self, hash: &PhoneHash) -> Option<&CandidateEntry> {
        self.entries.get(hash)
    }

    pub fn contains(&self, hash: &PhoneHash) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Distinct hashes in first-seen order.
    pub fn hashes(&self) -> &[PhoneHash] {
        &self.order
    }
}
