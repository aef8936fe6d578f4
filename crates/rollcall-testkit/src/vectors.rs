//! Reference scenarios with known outcomes.
//!
//! Each scenario fixes the address book, the normalizer's answers and the
//! directory's behavior, and records the exact outcome every implementation
//! of the run must produce from an empty contact store.

use rollcall_core::{MatchEntry, PhoneHash, RawCandidate, RunStatus, SyncOutcome};
use tokio_util::sync::CancellationToken;

use crate::directory::DirectoryScript;
use crate::fixtures::{FixedNormalizer, TestHarness};

/// A single reference scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub description: &'static str,
    /// Address book contents as `(raw number, lookup key)`.
    pub candidates: Vec<(&'static str, &'static str)>,
    /// Normalizer answers as `(raw number, normalized number)`.
    pub normalization: Vec<(&'static str, &'static str)>,
    pub script: DirectoryScript,
    /// Distinct hashes the lookup must carry.
    pub expected_hashes: usize,
    pub expected: SyncOutcome,
}

impl Scenario {
    /// Build the harness this scenario runs against.
    pub fn harness(&self) -> TestHarness {
        let candidates = self
            .candidates
            .iter()
            .map(|(raw, key)| RawCandidate::new(*raw, *key))
            .collect();
        TestHarness::new(candidates, self.script.clone())
            .with_normalizer(FixedNormalizer::new(&self.normalization))
    }

    /// Run the scenario once and return the outcome with its harness.
    pub async fn run(&self) -> (SyncOutcome, TestHarness) {
        let harness = self.harness();
        let outcome = harness.synchronizer().run(&CancellationToken::new()).await;
        (outcome, harness)
    }
}

fn matched(normalized_number: &str) -> MatchEntry {
    MatchEntry::new(PhoneHash::derive(normalized_number))
}

const SHARED_NUMBER: &[(&str, &str)] = &[("+1555", "+15550000000"), ("+1666", "+16660000000")];

/// Two lookup keys share a number; the directory knows both numbers.
pub fn duplicate_numbers_collapse() -> Scenario {
    Scenario {
        name: "duplicate_numbers_collapse",
        description: "duplicate numbers are looked up once and inserted once",
        candidates: vec![("+1555", "k1"), ("+1555", "k2"), ("+1666", "k3")],
        normalization: SHARED_NUMBER.to_vec(),
        script: DirectoryScript::RespondImmediately(vec![
            matched("+15550000000"),
            matched("+16660000000"),
        ]),
        expected_hashes: 2,
        expected: SyncOutcome {
            status: RunStatus::Done,
            inserted: 2,
            ..Default::default()
        },
    }
}

/// The directory reports a hash nobody asked about.
pub fn unknown_match_skipped() -> Scenario {
    Scenario {
        name: "unknown_match_skipped",
        description: "a matched hash with no local candidate is skipped",
        candidates: vec![("+1555", "k1"), ("+1666", "k3")],
        normalization: SHARED_NUMBER.to_vec(),
        script: DirectoryScript::RespondImmediately(vec![
            matched("+15550000000"),
            matched("+19990000000"),
        ]),
        expected_hashes: 2,
        expected: SyncOutcome {
            status: RunStatus::Done,
            inserted: 1,
            skipped: 1,
            ..Default::default()
        },
    }
}

/// The directory accepts the lookup and never answers.
pub fn lookup_times_out() -> Scenario {
    Scenario {
        name: "lookup_times_out",
        description: "a lookup without response fails the run without touching the store",
        candidates: vec![("+1555", "k1"), ("+1666", "k3")],
        normalization: SHARED_NUMBER.to_vec(),
        script: DirectoryScript::Silent,
        expected_hashes: 2,
        expected: SyncOutcome {
            status: RunStatus::Failed,
            io_errors: 1,
            ..Default::default()
        },
    }
}

/// The directory answers, but nobody matched.
pub fn nobody_registered() -> Scenario {
    Scenario {
        name: "nobody_registered",
        description: "an empty match list is a successful run with no contacts",
        candidates: vec![("+1555", "k1")],
        normalization: SHARED_NUMBER.to_vec(),
        script: DirectoryScript::RespondImmediately(vec![]),
        expected_hashes: 1,
        expected: SyncOutcome {
            status: RunStatus::Done,
            ..Default::default()
        },
    }
}

/// The directory reports an error for the transaction.
pub fn directory_error() -> Scenario {
    Scenario {
        name: "directory_error",
        description: "a directory error fails the run without touching the store",
        candidates: vec![("+1555", "k1")],
        normalization: SHARED_NUMBER.to_vec(),
        script: DirectoryScript::Error("internal server error".into()),
        expected_hashes: 1,
        expected: SyncOutcome {
            status: RunStatus::Failed,
            io_errors: 1,
            ..Default::default()
        },
    }
}

/// Get all reference scenarios.
pub fn all_scenarios() -> Vec<Scenario> {
    vec![
        duplicate_numbers_collapse(),
        unknown_match_skipped(),
        lookup_times_out(),
        nobody_registered(),
        directory_error(),
    ]
}
