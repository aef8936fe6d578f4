//! Store traits: the abstract interfaces a sync run reads from and writes to.
//!
//! Three collaborators live behind these traits. They are often the same
//! backend (see [`SqliteStore`](crate::SqliteStore)) but the synchronizer
//! treats them independently: the contact store is transactional, the
//! directory mirror is not.

use async_trait::async_trait;
use rollcall_core::{ContactInsert, LookupKey, PhoneHash, RawCandidate};

use crate::error::Result;

/// A batch applied to the contact store as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactBatch {
    /// Remove every synchronized contact of the account first.
    pub delete_all_synchronized: bool,
    /// Contacts to create after the delete.
    pub inserts: Vec<ContactInsert>,
}

impl ContactBatch {
    /// Number of logical operations in the batch.
    ///
    /// Operation 0 is the delete-all when present; inserts follow in order.
    pub fn operation_count(&self) -> usize {
        usize::from(self.delete_all_synchronized) + self.inserts.len()
    }
}

/// What an applied batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub deleted: usize,
    pub inserted: usize,
}

/// A user as recorded in the directory mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    pub hash: PhoneHash,
    pub registered: bool,
    pub status: Option<String>,
    pub last_seen: Option<i64>,
}

/// Read-only view of the local address book.
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// List every phone number with the contact it belongs to.
    ///
    /// Called once per run.
    async fn list_candidate_numbers(&self) -> Result<Vec<RawCandidate>>;
}

/// The synchronized contacts of an account.
///
/// # Atomicity
///
/// `apply_batch` must be all-or-nothing: if it returns an error, readers
/// must observe exactly the contacts that existed before the call.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Delete every synchronized contact of `account`, returning how many.
    async fn delete_all_synchronized(&self, account: &str) -> Result<usize>;

    /// Apply the delete and all inserts of `batch` atomically.
    async fn apply_batch(&self, account: &str, batch: &ContactBatch) -> Result<BatchReport>;

    /// Resolve a display name for an address book contact.
    ///
    /// Best-effort: any failure yields `fallback`.
    async fn resolve_display_name(&self, lookup_key: &LookupKey, fallback: &str) -> String;

    /// List the synchronized contacts of `account`.
    async fn list_synchronized(&self, account: &str) -> Result<Vec<ContactInsert>>;
}

/// Soft, per-user directory metadata.
///
/// Updates are staged and become visible on [`commit`](Self::commit). Each
/// update is independent; there is no rollback.
#[async_trait]
pub trait DirectoryMirror: Send + Sync {
    /// Drop anything staged and not committed, e.g. by a run whose commit
    /// failed.
    async fn discard_staged(&self) -> Result<()>;

    /// Stage `hash` as registered, with no status or last-seen time.
    async fn mark_registered(&self, hash: &PhoneHash) -> Result<()> {
        self.update_status(hash, None, None).await
    }

    /// Stage `hash` as registered with the given status and last-seen time.
    async fn update_status(
        &self,
        hash: &PhoneHash,
        status: Option<&str>,
        last_seen: Option<i64>,
    ) -> Result<()>;

    /// Publish the staged users as the registered set.
    ///
    /// Committed users that were not staged are kept but marked
    /// unregistered.
    async fn commit(&self) -> Result<()>;

    /// Get the committed record for `hash`.
    async fn get_user(&self, hash: &PhoneHash) -> Result<Option<DirectoryUser>>;
}
