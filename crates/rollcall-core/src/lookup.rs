//! Lookup requests, directory responses and their outcomes.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, LookupFailure, Result};
use crate::types::{PhoneHash, TransactionId};

/// One hash the directory reported as a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub hash: PhoneHash,
    /// Decoded status text, if the user published one.
    pub status: Option<String>,
    /// Last-seen time (Unix ms), if known.
    pub last_seen: Option<i64>,
}

impl MatchEntry {
    /// A match with no payload fields.
    pub fn new(hash: PhoneHash) -> Self {
        Self {
            hash,
            status: None,
            last_seen: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_last_seen(mut self, last_seen: i64) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    /// Whether the entry carries any metadata worth mirroring.
    pub fn has_payload(&self) -> bool {
        self.status.is_some() || self.last_seen.is_some()
    }
}

/// A directory lookup response as carried over the transport.
///
/// Encoded as CBOR. Entries keep the order the directory returned them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResponse {
    pub entries: Vec<MatchEntry>,
}

impl LookupResponse {
    pub fn new(entries: Vec<MatchEntry>) -> Self {
        Self { entries }
    }

    /// Encode to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| CoreError::EncodingError(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR bytes. Any malformed entry fails the whole response.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::DecodingError(e.to_string()))
    }
}

/// The single in-flight lookup of a sync run.
#[derive(Debug, Clone)]
pub struct LookupRequest {
    pub transaction_id: TransactionId,
    /// Distinct hashes, in candidate order.
    pub hashes: Vec<PhoneHash>,
    /// When the run stops waiting for the answer.
    pub deadline: Instant,
}

impl LookupRequest {
    pub fn new(transaction_id: TransactionId, hashes: Vec<PhoneHash>, timeout: Duration) -> Self {
        Self {
            transaction_id,
            hashes,
            deadline: Instant::now() + timeout,
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Terminal outcome of waiting for a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    Matched { entries: Vec<MatchEntry> },
    Failed { cause: LookupFailure },
    TimedOut,
    Canceled,
}

impl LookupResult {
    /// Whether the directory state is known (a match list arrived).
    pub fn is_certain(&self) -> bool {
        matches!(self, LookupResult::Matched { .. })
    }
}
