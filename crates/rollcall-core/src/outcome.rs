//! The aggregate result of a sync run.

use serde::{Deserialize, Serialize};

/// How a sync run terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Done,
    Failed,
    Canceled,
}

/// Counters reported to the scheduler after every run.
///
/// Runs are never retried internally; `is_error` tells the caller whether to
/// back off and retry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub status: RunStatus,
    /// Synchronized contacts created.
    pub inserted: usize,
    /// Synchronized contacts removed.
    pub deleted: usize,
    /// Matches that produced no contact.
    pub skipped: usize,
    /// Transport failures, directory errors and timeouts.
    pub io_errors: usize,
    /// A contact store or mirror commit failed.
    pub database_error: bool,
    /// Best-effort status updates that failed.
    pub metadata_errors: usize,
}

impl SyncOutcome {
    /// Whether the scheduler should treat this run as failed.
    pub fn is_error(&self) -> bool {
        self.database_error || self.io_errors > 0
    }

    pub fn is_canceled(&self) -> bool {
        self.status == RunStatus::Canceled
    }
}
