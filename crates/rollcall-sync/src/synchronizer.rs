//! The synchronizer: one contact-discovery run, end to end.
//!
//! ```text
//! Collecting ─┬─ empty ──> DeletingOnly ──────────────────────────> Done
//!             └─────────> Dispatching -> Awaiting -> Reconciling -> Applying -> Done
//! ```
//!
//! Cancellation is checked on entry to every phase up to and including
//! `Applying`, and continuously while awaiting the directory. Once the
//! contact batch has been handed to the store the run is no longer
//! cancellable.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use rollcall_core::{
    digit_count, reconcile, AccountContext, CandidateEntry, CandidateSet, KeyNormalizer,
    LookupRequest, LookupResult, ReconciliationPlan, RunStatus, SyncOutcome, TransactionId,
};
use rollcall_store::{ContactBatch, ContactSource, ContactStore, DirectoryMirror};

use crate::correlator::Correlator;
use crate::directory::DirectoryClient;
use crate::error::{Result, SyncError};

/// How long a run waits for the directory to answer.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Numbers with fewer digits than this are never looked up.
pub const DEFAULT_MIN_NUMBER_DIGITS: usize = 4;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Single bound on the wait for the directory response. Not retried.
    pub lookup_timeout: Duration,
    /// Minimum digits a raw number needs to be considered at all.
    pub min_number_digits: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            min_number_digits: DEFAULT_MIN_NUMBER_DIGITS,
        }
    }
}

/// Phases of a run, as they appear in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Collecting,
    DeletingOnly,
    Dispatching,
    Awaiting,
    Reconciling,
    Applying,
}

/// The external collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ContactSource>,
    pub normalizer: Arc<dyn KeyNormalizer>,
    pub directory: Arc<dyn DirectoryClient>,
    pub contacts: Arc<dyn ContactStore>,
    pub mirror: Arc<dyn DirectoryMirror>,
}

/// Drives sync runs for one account.
///
/// Runs must not overlap; serializing them is the caller's job.
pub struct Synchronizer {
    account: AccountContext,
    collaborators: Collaborators,
    correlator: Correlator,
    config: SyncConfig,
}

impl Synchronizer {
    pub fn new(account: AccountContext, collaborators: Collaborators, config: SyncConfig) -> Self {
        Self {
            account,
            collaborators,
            correlator: Correlator::new(),
            config,
        }
    }

    pub fn account(&self) -> &AccountContext {
        &self.account
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The correlator directory responses are routed through.
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Perform one run.
    ///
    /// Never fails: every error is folded into the returned outcome.
    pub async fn run(&self, cancel: &CancellationToken) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        let status = match self.drive(cancel, &mut outcome).await {
            Ok(()) => RunStatus::Done,
            Err(SyncError::Cancelled) => {
                tracing::info!(account = %self.account.name, "sync canceled");
                RunStatus::Canceled
            }
            Err(SyncError::Timeout(after)) => {
                tracing::warn!(account = %self.account.name, ?after, "directory timeout, aborting sync");
                RunStatus::Failed
            }
            Err(e) => {
                tracing::error!(account = %self.account.name, error = %e, "sync failed");
                RunStatus::Failed
            }
        };
        outcome.status = status;

        tracing::info!(
            account = %self.account.name,
            status = ?outcome.status,
            inserted = outcome.inserted,
            deleted = outcome.deleted,
            skipped = outcome.skipped,
            io_errors = outcome.io_errors,
            database_error = outcome.database_error,
            metadata_errors = outcome.metadata_errors,
            "sync run finished"
        );

        outcome
    }

    async fn drive(&self, cancel: &CancellationToken, outcome: &mut SyncOutcome) -> Result<()> {
        self.enter(SyncPhase::Collecting, cancel)?;
        let candidates = self.collect(cancel, outcome).await?;
        check_cancelled(cancel)?;

        if candidates.is_empty() {
            self.enter(SyncPhase::DeletingOnly, cancel)?;
            return self.delete_only(outcome).await;
        }

        self.enter(SyncPhase::Dispatching, cancel)?;
        let transaction_id = TransactionId::random();
        // Registered before dispatch: a client may answer synchronously.
        let pending = self.correlator.register(transaction_id).map_err(|e| {
            outcome.io_errors += 1;
            e
        })?;
        let request = LookupRequest::new(
            transaction_id,
            candidates.hashes().to_vec(),
            self.config.lookup_timeout,
        );
        tracing::debug!(
            transaction = %transaction_id,
            hashes = request.hashes.len(),
            "dispatching lookup"
        );
        if let Err(e) = self
            .collaborators
            .directory
            .dispatch_lookup(&request, self.correlator.sink())
            .await
        {
            outcome.io_errors += 1;
            return Err(e);
        }

        self.enter(SyncPhase::Awaiting, cancel)?;
        let result = pending.wait(request.remaining(), cancel).await;
        if result == LookupResult::Canceled {
            return Err(SyncError::Cancelled);
        }

        self.enter(SyncPhase::Reconciling, cancel)?;
        let plan = reconcile(&candidates, &result);
        if !result.is_certain() {
            outcome.io_errors += plan.io_errors;
            return Err(match result {
                LookupResult::Failed { cause } => SyncError::Lookup(cause),
                LookupResult::TimedOut => SyncError::Timeout(self.config.lookup_timeout),
                _ => SyncError::Cancelled,
            });
        }

        self.enter(SyncPhase::Applying, cancel)?;
        self.apply(plan, outcome).await
    }

    fn enter(&self, phase: SyncPhase, cancel: &CancellationToken) -> Result<()> {
        check_cancelled(cancel)?;
        tracing::debug!(account = %self.account.name, ?phase, "entering phase");
        Ok(())
    }

    /// Read, filter, normalize and deduplicate the address book.
    async fn collect(
        &self,
        cancel: &CancellationToken,
        outcome: &mut SyncOutcome,
    ) -> Result<CandidateSet> {
        let raw = match self.collaborators.source.list_candidate_numbers().await {
            Ok(raw) => raw,
            Err(e) => {
                outcome.database_error = true;
                return Err(e.into());
            }
        };

        let mut candidates = CandidateSet::new();
        let mut rejected = 0usize;
        for candidate in raw {
            check_cancelled(cancel)?;

            if digit_count(&candidate.raw_number) < self.config.min_number_digits {
                rejected += 1;
                continue;
            }
            match self
                .collaborators
                .normalizer
                .normalize(&candidate.raw_number, &self.account)
            {
                Ok(normalized) => {
                    candidates.insert(CandidateEntry::new(
                        candidate.lookup_key,
                        candidate.raw_number,
                        normalized,
                    ));
                }
                Err(e) => {
                    rejected += 1;
                    tracing::warn!(
                        lookup_key = %candidate.lookup_key,
                        error = %e,
                        "unable to normalize number, skipping"
                    );
                }
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            rejected,
            "collected candidates"
        );
        Ok(candidates)
    }

    async fn delete_only(&self, outcome: &mut SyncOutcome) -> Result<()> {
        match self
            .collaborators
            .contacts
            .delete_all_synchronized(&self.account.name)
            .await
        {
            Ok(deleted) => {
                outcome.deleted = deleted;
                Ok(())
            }
            Err(e) => {
                outcome.database_error = true;
                Err(e.into())
            }
        }
    }

    /// Apply the contact batch atomically, then rebuild the mirror's
    /// registered set best-effort.
    async fn apply(&self, plan: ReconciliationPlan, outcome: &mut SyncOutcome) -> Result<()> {
        let contacts = &self.collaborators.contacts;

        let mut inserts = plan.inserts;
        for insert in &mut inserts {
            insert.display_name = contacts
                .resolve_display_name(&insert.lookup_key, &insert.normalized_number)
                .await;
        }
        let batch = ContactBatch {
            delete_all_synchronized: plan.delete_all_existing,
            inserts,
        };

        match contacts.apply_batch(&self.account.name, &batch).await {
            Ok(report) => {
                outcome.deleted = report.deleted;
                outcome.inserted = report.inserted;
                outcome.skipped = plan.skipped;
            }
            Err(e) => {
                outcome.database_error = true;
                outcome.skipped = plan.skipped + batch.inserts.len();
                return Err(e.into());
            }
        }

        let mirror = &self.collaborators.mirror;
        if let Err(e) = mirror.discard_staged().await {
            outcome.database_error = true;
            return Err(e.into());
        }
        for hash in &plan.registered {
            if let Err(e) = mirror.mark_registered(hash).await {
                outcome.metadata_errors += 1;
                tracing::warn!(hash = %hash, error = %e, "registration update failed");
            }
        }
        for update in &plan.updates {
            if let Err(e) = mirror
                .update_status(&update.hash, update.status.as_deref(), update.last_seen)
                .await
            {
                outcome.metadata_errors += 1;
                tracing::warn!(hash = %update.hash, error = %e, "status update failed");
            }
        }

        if let Err(e) = mirror.commit().await {
            outcome.database_error = true;
            return Err(e.into());
        }

        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::memory::MemoryDirectory;

    use rollcall_core::{E164Normalizer, MatchEntry, PhoneHash, RawCandidate};
    use rollcall_store::{MemoryContactSource, MemoryContactStore, MemoryDirectoryMirror};

    struct Fixture {
        source: Arc<MemoryContactSource>,
        directory: Arc<MemoryDirectory>,
        contacts: Arc<MemoryContactStore>,
        mirror: Arc<MemoryDirectoryMirror>,
        synchronizer: Synchronizer,
    }

    fn fixture(numbers: Vec<RawCandidate>) -> Fixture {
        let source = Arc::new(MemoryContactSource::new(numbers));
        let directory = Arc::new(MemoryDirectory::new(Duration::from_millis(5)));
        let contacts = Arc::new(MemoryContactStore::new());
        let mirror = Arc::new(MemoryDirectoryMirror::new());

        let collaborators = Collaborators {
            source: source.clone(),
            normalizer: Arc::new(E164Normalizer::default()),
            directory: directory.clone(),
            contacts: contacts.clone(),
            mirror: mirror.clone(),
        };
        let config = SyncConfig {
            lookup_timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let synchronizer =
            Synchronizer::new(AccountContext::new("alice", "1"), collaborators, config);

        Fixture {
            source,
            directory,
            contacts,
            mirror,
            synchronizer,
        }
    }

    #[tokio::test]
    async fn test_run_inserts_registered_contacts() {
        let f = fixture(vec![
            RawCandidate::new("+1 555 000 0001", "k1"),
            RawCandidate::new("(555) 000-0002", "k2"),
            RawCandidate::new("+1 555 000 0003", "k3"),
        ]);
        f.directory.register("+15550000001");
        f.directory.register_entry(
            MatchEntry::new(PhoneHash::derive("+15550000002"))
                .with_status("available")
                .with_last_seen(42),
        );
        f.contacts.set_display_name("k1".into(), "Alice");

        let outcome = f.synchronizer.run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(outcome.inserted, 2);
        assert!(!outcome.is_error());

        let stored = f.contacts.list_synchronized("alice").await.unwrap();
        let names: Vec<_> = stored.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "+15550000002"]);

        let user = f
            .mirror
            .get_user(&PhoneHash::derive("+15550000002"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.status.as_deref(), Some("available"));
        assert_eq!(user.last_seen, Some(42));

        let bare = f
            .mirror
            .get_user(&PhoneHash::derive("+15550000001"))
            .await
            .unwrap()
            .unwrap();
        assert!(bare.registered);
        assert_eq!(bare.status, None);
        assert_eq!(f.mirror.update_attempts(), 2);
    }

    #[tokio::test]
    async fn test_short_numbers_and_rejects_are_dropped() {
        let f = fixture(vec![
            RawCandidate::new("112", "emergency"),
            RawCandidate::new("not a number", "junk"),
        ]);

        let outcome = f.synchronizer.run(&CancellationToken::new()).await;

        // Nothing eligible: delete-only, no lookup.
        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(f.directory.lookups(), 0);
        assert_eq!(f.contacts.delete_all_calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_unavailable_fails_without_mutation() {
        let f = fixture(vec![RawCandidate::new("+15550000001", "k1")]);
        f.directory.set_available(false);

        let outcome = f.synchronizer.run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.io_errors, 1);
        assert!(!f.contacts.was_mutated());
        assert_eq!(f.synchronizer.correlator().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_source_failure_is_database_error() {
        let f = fixture(vec![RawCandidate::new("+15550000001", "k1")]);
        f.source.set_failing(true);

        let outcome = f.synchronizer.run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.database_error);
        assert_eq!(f.directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_cancel_before_run_touches_nothing() {
        let f = fixture(vec![RawCandidate::new("+15550000001", "k1")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = f.synchronizer.run(&cancel).await;

        assert_eq!(outcome.status, RunStatus::Canceled);
        assert!(!outcome.is_error());
        assert_eq!(f.source.reads(), 0);
        assert!(!f.contacts.was_mutated());
    }

    #[tokio::test]
    async fn test_mirror_commit_failure_is_database_error() {
        let f = fixture(vec![RawCandidate::new("+15550000001", "k1")]);
        f.directory.register("+15550000001");
        f.mirror.fail_commit(true);

        let outcome = f.synchronizer.run(&CancellationToken::new()).await;

        // The contact batch itself was committed.
        assert_eq!(outcome.inserted, 1);
        assert!(outcome.database_error);
        assert_eq!(outcome.status, RunStatus::Failed);
    }
}
