//! In-memory implementations of the store traits.
//!
//! These are primarily for testing. They follow the same semantics as SQLite
//! (including batch atomicity) and can be told to fail on demand.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use rollcall_core::{ContactInsert, LookupKey, PhoneHash, RawCandidate};

use crate::error::{Result, StoreError};
use crate::traits::{
    BatchReport, ContactBatch, ContactSource, ContactStore, DirectoryMirror, DirectoryUser,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Contact source
// ─────────────────────────────────────────────────────────────────────────────

/// A fixed address book.
#[derive(Default)]
pub struct MemoryContactSource {
    numbers: RwLock<Vec<RawCandidate>>,
    fail: RwLock<bool>,
    reads: AtomicUsize,
}

impl MemoryContactSource {
    pub fn new(numbers: Vec<RawCandidate>) -> Self {
        Self {
            numbers: RwLock::new(numbers),
            ..Default::default()
        }
    }

    /// Make subsequent reads fail.
    pub fn set_failing(&self, fail: bool) {
        *write(&self.fail) = fail;
    }

    /// How many times the address book was read.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactSource for MemoryContactSource {
    async fn list_candidate_numbers(&self) -> Result<Vec<RawCandidate>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if *read(&self.fail) {
            return Err(StoreError::Unavailable("address book unavailable".into()));
        }
        Ok(read(&self.numbers).clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Contact store
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory contact store.
///
/// `apply_batch` works on a copy and swaps it in only when every operation
/// succeeded, so an injected failure leaves the contacts untouched.
#[derive(Default)]
pub struct MemoryContactStore {
    inner: RwLock<MemoryContactStoreInner>,
}

#[derive(Default)]
struct MemoryContactStoreInner {
    /// Synchronized contacts per account.
    contacts: HashMap<String, Vec<ContactInsert>>,
    /// Address book display names.
    display_names: HashMap<LookupKey, String>,
    /// Fail `apply_batch` when it reaches this operation index.
    fail_at_operation: Option<usize>,
    fail_delete_all: bool,
    apply_batch_calls: usize,
    delete_all_calls: usize,
}

impl MemoryContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the synchronized contacts of `account`.
    pub fn seed(&self, account: &str, contacts: Vec<ContactInsert>) {
        write(&self.inner)
            .contacts
            .insert(account.to_string(), contacts);
    }

    /// Register the address book name of `lookup_key`.
    pub fn set_display_name(&self, lookup_key: LookupKey, name: impl Into<String>) {
        write(&self.inner).display_names.insert(lookup_key, name.into());
    }

    /// Fail the next batches at operation `index` (`None` disables).
    pub fn fail_batch_at(&self, index: Option<usize>) {
        write(&self.inner).fail_at_operation = index;
    }

    /// Make `delete_all_synchronized` fail.
    pub fn fail_delete_all(&self, fail: bool) {
        write(&self.inner).fail_delete_all = fail;
    }

    /// Number of `apply_batch` calls, successful or not.
    pub fn apply_batch_calls(&self) -> usize {
        read(&self.inner).apply_batch_calls
    }

    /// Number of `delete_all_synchronized` calls, successful or not.
    pub fn delete_all_calls(&self) -> usize {
        read(&self.inner).delete_all_calls
    }

    /// Whether the store was ever asked to change anything.
    pub fn was_mutated(&self) -> bool {
        let inner = read(&self.inner);
        inner.apply_batch_calls > 0 || inner.delete_all_calls > 0
    }
}

#[async_trait]
impl ContactStore for MemoryContactStore {
    async fn delete_all_synchronized(&self, account: &str) -> Result<usize> {
        let mut inner = write(&self.inner);
        inner.delete_all_calls += 1;
        if inner.fail_delete_all {
            return Err(StoreError::Unavailable("injected delete failure".into()));
        }
        Ok(inner.contacts.remove(account).map(|c| c.len()).unwrap_or(0))
    }

    async fn apply_batch(&self, account: &str, batch: &ContactBatch) -> Result<BatchReport> {
        let mut inner = write(&self.inner);
        inner.apply_batch_calls += 1;

        let mut working = inner.contacts.get(account).cloned().unwrap_or_default();
        let mut report = BatchReport::default();
        let mut index = 0;

        let fail_at = inner.fail_at_operation;
        let check = |index: usize| match fail_at {
            Some(at) if at == index => Err(StoreError::Unavailable(format!(
                "injected failure at operation {}",
                index
            ))),
            _ => Ok(()),
        };

        if batch.delete_all_synchronized {
            check(index)?;
            report.deleted = working.len();
            working.clear();
            index += 1;
        }

        for insert in &batch.inserts {
            check(index)?;
            working.push(insert.clone());
            report.inserted += 1;
            index += 1;
        }

        inner.contacts.insert(account.to_string(), working);
        Ok(report)
    }

    async fn resolve_display_name(&self, lookup_key: &LookupKey, fallback: &str) -> String {
        read(&self.inner)
            .display_names
            .get(lookup_key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }

    async fn list_synchronized(&self, account: &str) -> Result<Vec<ContactInsert>> {
        Ok(read(&self.inner)
            .contacts
            .get(account)
            .cloned()
            .unwrap_or_default())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Directory mirror
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory directory mirror with staged updates.
#[derive(Default)]
pub struct MemoryDirectoryMirror {
    inner: RwLock<MemoryMirrorInner>,
}

#[derive(Default)]
struct MemoryMirrorInner {
    staged: HashMap<PhoneHash, DirectoryUser>,
    committed: HashMap<PhoneHash, DirectoryUser>,
    failing: HashSet<PhoneHash>,
    fail_commit: bool,
    update_attempts: usize,
    commits: usize,
}

impl MemoryDirectoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make updates for `hash` fail.
    pub fn fail_updates_for(&self, hash: PhoneHash) {
        write(&self.inner).failing.insert(hash);
    }

    pub fn fail_commit(&self, fail: bool) {
        write(&self.inner).fail_commit = fail;
    }

    /// Number of staging calls, successful or not.
    pub fn update_attempts(&self) -> usize {
        read(&self.inner).update_attempts
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        read(&self.inner).commits
    }
}

#[async_trait]
impl DirectoryMirror for MemoryDirectoryMirror {
    async fn discard_staged(&self) -> Result<()> {
        write(&self.inner).staged.clear();
        Ok(())
    }

    async fn update_status(
        &self,
        hash: &PhoneHash,
        status: Option<&str>,
        last_seen: Option<i64>,
    ) -> Result<()> {
        let mut inner = write(&self.inner);
        inner.update_attempts += 1;
        if inner.failing.contains(hash) {
            return Err(StoreError::Unavailable(format!("injected update failure for {}", hash)));
        }
        inner.staged.insert(
            *hash,
            DirectoryUser {
                hash: *hash,
                registered: true,
                status: status.map(str::to_string),
                last_seen,
            },
        );
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut inner = write(&self.inner);
        if inner.fail_commit {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        let staged = std::mem::take(&mut inner.staged);
        for (hash, user) in inner.committed.iter_mut() {
            if !staged.contains_key(hash) {
                user.registered = false;
            }
        }
        inner.committed.extend(staged);
        inner.commits += 1;
        Ok(())
    }

    async fn get_user(&self, hash: &PhoneHash) -> Result<Option<DirectoryUser>> {
        Ok(read(&self.inner).committed.get(hash).cloned())
    }
}
