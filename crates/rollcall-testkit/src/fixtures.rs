//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rollcall_core::{
    AccountContext, ContactInsert, E164Normalizer, InvalidNumber, KeyNormalizer, LookupKey,
    PhoneHash, RawCandidate,
};
use rollcall_store::{
    ContactStore, MemoryContactSource, MemoryContactStore, MemoryDirectoryMirror,
};
use rollcall_sync::{Collaborators, SyncConfig, Synchronizer};

use crate::directory::{DirectoryScript, ScriptedDirectory};

/// Account name used by every harness.
pub const TEST_ACCOUNT: &str = "alice";

/// A sync config with a short lookup timeout.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        lookup_timeout: Duration::from_millis(200),
        ..Default::default()
    }
}

/// A synchronized contact as a previous run would have stored it.
pub fn contact(normalized_number: &str, lookup_key: &str) -> ContactInsert {
    ContactInsert {
        display_name: normalized_number.to_string(),
        normalized_number: normalized_number.to_string(),
        hash: PhoneHash::derive(normalized_number),
        lookup_key: LookupKey::from(lookup_key),
    }
}

/// Normalizer with fixed answers for some inputs, E.164 for the rest.
#[derive(Debug, Clone, Default)]
pub struct FixedNormalizer {
    table: HashMap<String, String>,
    fallback: E164Normalizer,
}

impl FixedNormalizer {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            table: pairs
                .iter()
                .map(|(raw, normalized)| (raw.to_string(), normalized.to_string()))
                .collect(),
            fallback: E164Normalizer::default(),
        }
    }
}

impl KeyNormalizer for FixedNormalizer {
    fn normalize(&self, raw: &str, account: &AccountContext) -> Result<String, InvalidNumber> {
        match self.table.get(raw) {
            Some(normalized) => Ok(normalized.clone()),
            None => self.fallback.normalize(raw, account),
        }
    }
}

/// In-memory collaborators for one account, with a scripted directory.
pub struct TestHarness {
    pub account: AccountContext,
    pub source: Arc<MemoryContactSource>,
    pub normalizer: Arc<dyn KeyNormalizer>,
    pub directory: Arc<ScriptedDirectory>,
    pub contacts: Arc<MemoryContactStore>,
    pub mirror: Arc<MemoryDirectoryMirror>,
    pub config: SyncConfig,
}

impl TestHarness {
    pub fn new(candidates: Vec<RawCandidate>, script: DirectoryScript) -> Self {
        Self {
            account: AccountContext::new(TEST_ACCOUNT, "1"),
            source: Arc::new(MemoryContactSource::new(candidates)),
            normalizer: Arc::new(E164Normalizer::default()),
            directory: Arc::new(ScriptedDirectory::new(script)),
            contacts: Arc::new(MemoryContactStore::new()),
            mirror: Arc::new(MemoryDirectoryMirror::new()),
            config: test_config(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: impl KeyNormalizer + 'static) -> Self {
        self.normalizer = Arc::new(normalizer);
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Pre-populate the synchronized contacts, as a previous run would have.
    pub fn seed(&self, contacts: Vec<ContactInsert>) {
        self.contacts.seed(&self.account.name, contacts);
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            source: self.source.clone(),
            normalizer: self.normalizer.clone(),
            directory: self.directory.clone(),
            contacts: self.contacts.clone(),
            mirror: self.mirror.clone(),
        }
    }

    pub fn synchronizer(&self) -> Synchronizer {
        Synchronizer::new(
            self.account.clone(),
            self.collaborators(),
            self.config.clone(),
        )
    }

    /// The synchronized contacts currently stored for the account.
    pub async fn synchronized(&self) -> Vec<ContactInsert> {
        self.contacts
            .list_synchronized(&self.account.name)
            .await
            .unwrap_or_default()
    }
}
