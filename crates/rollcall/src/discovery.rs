//! ContactDiscovery: the entry point a scheduler drives.
//!
//! Wraps a [`Synchronizer`] with the run-in-progress guard and the
//! cancellation handle of the current run.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use rollcall_core::{AccountContext, E164Normalizer, KeyNormalizer, SyncOutcome};
use rollcall_store::SqliteStore;
use rollcall_sync::{Collaborators, DirectoryClient, SyncConfig, Synchronizer};

use crate::error::{DiscoveryError, Result};

/// Configuration for contact discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// The account synchronized contacts are recorded under.
    pub account: AccountContext,
    /// Sync configuration.
    pub sync: SyncConfig,
}

impl DiscoveryConfig {
    pub fn new(account: AccountContext) -> Self {
        Self {
            account,
            sync: SyncConfig::default(),
        }
    }
}

/// Contact discovery for one account.
///
/// At most one run is in flight at a time; a second `sync_now` while one
/// is running is rejected rather than queued.
pub struct ContactDiscovery {
    synchronizer: Synchronizer,
    /// Cancellation handle of the run in progress, if any.
    current: Mutex<Option<CancellationToken>>,
}

impl ContactDiscovery {
    /// Create a discovery instance over explicit collaborators.
    pub fn new(config: DiscoveryConfig, collaborators: Collaborators) -> Self {
        Self {
            synchronizer: Synchronizer::new(config.account, collaborators, config.sync),
            current: Mutex::new(None),
        }
    }

    /// Use one SQLite database as address book, contact store and mirror.
    pub fn with_sqlite(
        config: DiscoveryConfig,
        store: SqliteStore,
        normalizer: Arc<dyn KeyNormalizer>,
        directory: Arc<dyn DirectoryClient>,
    ) -> Self {
        let store = Arc::new(store);
        let collaborators = Collaborators {
            source: store.clone(),
            normalizer,
            directory,
            contacts: store.clone(),
            mirror: store,
        };
        Self::new(config, collaborators)
    }

    /// Open the SQLite database at `path` and wire it up with the default
    /// E.164 normalizer.
    pub fn open(
        path: impl AsRef<Path>,
        config: DiscoveryConfig,
        directory: Arc<dyn DirectoryClient>,
    ) -> Result<Self> {
        let store = SqliteStore::open(path)?;
        Ok(Self::with_sqlite(
            config,
            store,
            Arc::new(E164Normalizer::default()),
            directory,
        ))
    }

    pub fn account(&self) -> &AccountContext {
        self.synchronizer.account()
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Run one synchronization now.
    ///
    /// Fails only if another run is in progress; everything that goes wrong
    /// inside the run is reported in the returned outcome.
    pub async fn sync_now(&self) -> Result<SyncOutcome> {
        let guard = RunGuard::acquire(self)?;
        tracing::debug!(account = %self.account().name, "sync started");
        let outcome = self.synchronizer.run(&guard.token).await;
        Ok(outcome)
    }

    /// Ask the run in progress to stop at its next checkpoint.
    ///
    /// Idempotent. Returns whether a run was in progress.
    pub fn cancel(&self) -> bool {
        match self.lock().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a run in progress for as long as it lives.
struct RunGuard<'a> {
    owner: &'a ContactDiscovery,
    token: CancellationToken,
}

impl<'a> RunGuard<'a> {
    fn acquire(owner: &'a ContactDiscovery) -> Result<Self> {
        let mut current = owner.lock();
        if current.is_some() {
            return Err(DiscoveryError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *current = Some(token.clone());
        Ok(Self { owner, token })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rollcall_core::{LookupKey, RunStatus};
    use rollcall_store::ContactStore;
    use rollcall_sync::MemoryDirectory;

    async fn discovery(latency: Duration) -> (ContactDiscovery, Arc<MemoryDirectory>) {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert_address_book_entry(&LookupKey::from("k1"), "+1 555 000 0001", Some("Alice"))
            .await
            .unwrap();

        let directory = Arc::new(MemoryDirectory::new(latency));
        directory.register("+15550000001");

        let config = DiscoveryConfig::new(AccountContext::new("alice", "1"));
        let discovery = ContactDiscovery::with_sqlite(
            config,
            store,
            Arc::new(E164Normalizer::default()),
            directory.clone(),
        );
        (discovery, directory)
    }

    #[tokio::test]
    async fn test_sync_now_rebuilds_contacts() {
        let (discovery, _) = discovery(Duration::ZERO).await;

        let outcome = discovery.sync_now().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(outcome.inserted, 1);
        assert!(!discovery.is_running());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_rejected() {
        let (discovery, directory) = discovery(Duration::from_millis(200)).await;

        let (first, second) = tokio::join!(discovery.sync_now(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            discovery.sync_now().await
        });

        assert_eq!(first.unwrap().status, RunStatus::Done);
        assert!(matches!(second, Err(DiscoveryError::AlreadyRunning)));
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_cancel_stops_waiting_run() {
        let (discovery, _) = discovery(Duration::from_secs(2)).await;

        let (outcome, cancelled) = tokio::join!(discovery.sync_now(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let first = discovery.cancel();
            let second = discovery.cancel();
            first && second
        });

        let outcome = outcome.unwrap();
        assert!(cancelled);
        assert!(outcome.is_canceled());
        assert!(!outcome.is_error());
        assert!(!discovery.is_running());
    }

    #[tokio::test]
    async fn test_cancel_without_run_is_noop() {
        let (discovery, _) = discovery(Duration::ZERO).await;
        assert!(!discovery.cancel());

        // A cancel issued while idle does not leak into the next run.
        let outcome = discovery.sync_now().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Done);
    }

    #[tokio::test]
    async fn test_open_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.db");
        let directory = Arc::new(MemoryDirectory::default());

        let config = DiscoveryConfig::new(AccountContext::new("alice", "1"));
        let discovery = ContactDiscovery::open(&path, config, directory).unwrap();

        // Empty address book: delete-only.
        let outcome = discovery.sync_now().await.unwrap();
        assert_eq!(outcome.status, RunStatus::Done);
        assert_eq!(outcome.deleted, 0);

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.list_synchronized("alice").await.unwrap().is_empty());
    }
}
