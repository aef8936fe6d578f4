//! Reconciliation: from a lookup outcome to the local store mutation.
//!
//! This module is pure. It decides *what* the contact store must look like
//! after a run; applying the plan is the synchronizer's job.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::candidate::CandidateSet;
use crate::lookup::LookupResult;
use crate::types::{LookupKey, PhoneHash};

/// One synchronized contact to create.
///
/// Stores may lay this out as one row or several, but the whole record must
/// be written atomically with the rest of the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInsert {
    pub display_name: String,
    pub normalized_number: String,
    pub hash: PhoneHash,
    /// Address book contact this record was discovered from.
    pub lookup_key: LookupKey,
}

/// Soft metadata for a matched user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub hash: PhoneHash,
    pub status: Option<String>,
    pub last_seen: Option<i64>,
}

/// The store mutation computed for one lookup outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Drop every synchronized contact before inserting.
    pub delete_all_existing: bool,
    /// Contacts to create, in directory order.
    pub inserts: Vec<ContactInsert>,
    /// Matched users that carried metadata.
    pub updates: Vec<StatusUpdate>,
    /// Matched users without metadata. Together with `updates` this is the
    /// registered set of the run.
    pub registered: Vec<PhoneHash>,
    /// Matched hashes with no local candidate, or repeated in the response.
    pub skipped: usize,
    /// 1 when the directory state is unknown, 0 otherwise.
    pub io_errors: usize,
}

impl ReconciliationPlan {
    /// Whether applying the plan touches the contact store at all.
    pub fn mutates_store(&self) -> bool {
        self.delete_all_existing || !self.inserts.is_empty()
    }
}

/// Compute the plan for `result` against the run's candidates.
///
/// Uncertain outcomes never produce a destructive plan: the mirror is left
/// stale rather than rebuilt from incomplete information. Display names
/// default to the normalized number; callers may resolve better ones before
/// applying.
pub fn reconcile(candidates: &CandidateSet, result: &LookupResult) -> ReconciliationPlan {
    let entries = match result {
        LookupResult::Matched { entries } => entries,
        LookupResult::Failed { .. } | LookupResult::TimedOut | LookupResult::Canceled => {
            return ReconciliationPlan {
                io_errors: 1,
                ..Default::default()
            };
        }
    };

    let mut plan = ReconciliationPlan {
        delete_all_existing: true,
        ..Default::default()
    };

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        let candidate = match candidates.get(&entry.hash) {
            Some(candidate) if seen.insert(entry.hash) => candidate,
            _ => {
                plan.skipped += 1;
                continue;
            }
        };

        plan.inserts.push(ContactInsert {
            display_name: candidate.normalized_number.clone(),
            normalized_number: candidate.normalized_number.clone(),
            hash: candidate.hash,
            lookup_key: candidate.lookup_key.clone(),
        });

        if entry.has_payload() {
            plan.updates.push(StatusUpdate {
                hash: entry.hash,
                status: entry.status.clone(),
                last_seen: entry.last_seen,
            });
        } else {
            plan.registered.push(entry.hash);
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateEntry;
    use crate::error::LookupFailure;
    use crate::lookup::MatchEntry;
    use proptest::prelude::*;

    fn candidates(numbers: &[(&str, &str)]) -> CandidateSet {
        let mut set = CandidateSet::new();
        for (number, key) in numbers {
            set.insert(CandidateEntry::new(
                LookupKey::from(*key),
                number.to_string(),
                number.to_string(),
            ));
        }
        set
    }

    #[test]
    fn test_uncertain_outcomes_produce_empty_plan() {
        let set = candidates(&[("+15550000000", "k1")]);
        let outcomes = [
            LookupResult::Failed {
                cause: LookupFailure::Directory("boom".into()),
            },
            LookupResult::TimedOut,
            LookupResult::Canceled,
        ];

        for outcome in outcomes {
            let plan = reconcile(&set, &outcome);
            assert!(!plan.mutates_store());
            assert!(plan.updates.is_empty());
            assert!(plan.registered.is_empty());
            assert_eq!(plan.io_errors, 1);
        }
    }

    #[test]
    fn test_no_matches_clears_mirror() {
        let set = candidates(&[("+15550000000", "k1")]);
        let plan = reconcile(&set, &LookupResult::Matched { entries: vec![] });

        assert!(plan.delete_all_existing);
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.io_errors, 0);
    }

    #[test]
    fn test_matches_become_inserts_in_directory_order() {
        let set = candidates(&[("+15550000000", "k2"), ("+16660000000", "k3")]);
        let entries = vec![
            MatchEntry::new(PhoneHash::derive("+16660000000")),
            MatchEntry::new(PhoneHash::derive("+15550000000")),
        ];
        let plan = reconcile(&set, &LookupResult::Matched { entries });

        assert!(plan.delete_all_existing);
        assert_eq!(plan.skipped, 0);
        let numbers: Vec<_> = plan.inserts.iter().map(|i| i.normalized_number.as_str()).collect();
        assert_eq!(numbers, vec!["+16660000000", "+15550000000"]);
        assert_eq!(plan.inserts[0].display_name, "+16660000000");
        assert_eq!(plan.inserts[0].lookup_key, LookupKey::from("k3"));
    }

    #[test]
    fn test_unknown_hash_is_skipped() {
        let set = candidates(&[("+15550000000", "k1")]);
        let entries = vec![
            MatchEntry::new(PhoneHash::derive("+15550000000")),
            MatchEntry::new(PhoneHash::derive("+19990000000")).with_status("stranger"),
        ];
        let plan = reconcile(&set, &LookupResult::Matched { entries });

        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.skipped, 1);
        // Skipped hashes have no local reference, so no metadata either.
        assert!(plan.updates.is_empty());
        assert_eq!(plan.registered, vec![PhoneHash::derive("+15550000000")]);
    }

    #[test]
    fn test_matches_without_payload_are_registered_only() {
        let set = candidates(&[("+15550000000", "k1"), ("+16660000000", "k2")]);
        let entries = vec![
            MatchEntry::new(PhoneHash::derive("+15550000000"))
                .with_status("available")
                .with_last_seen(42),
            MatchEntry::new(PhoneHash::derive("+16660000000")),
        ];
        let plan = reconcile(&set, &LookupResult::Matched { entries });

        assert_eq!(plan.inserts.len(), 2);
        assert_eq!(
            plan.updates,
            vec![StatusUpdate {
                hash: PhoneHash::derive("+15550000000"),
                status: Some("available".into()),
                last_seen: Some(42),
            }]
        );
        assert_eq!(plan.registered, vec![PhoneHash::derive("+16660000000")]);
    }

    #[test]
    fn test_repeated_hash_inserts_once() {
        let set = candidates(&[("+15550000000", "k1")]);
        let entries = vec![
            MatchEntry::new(PhoneHash::derive("+15550000000")),
            MatchEntry::new(PhoneHash::derive("+15550000000")).with_status("again"),
        ];
        let plan = reconcile(&set, &LookupResult::Matched { entries });

        assert_eq!(plan.inserts.len(), 1);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.registered, vec![PhoneHash::derive("+15550000000")]);
        assert_eq!(plan.skipped, 1);
    }

    proptest! {
        #[test]
        fn prop_inserts_are_matched_candidates(
            local in prop::collection::btree_set(1000u32..1100, 1..20),
            remote in prop::collection::vec(1000u32..1200, 0..40),
        ) {
            let mut set = CandidateSet::new();
            for n in &local {
                let number = format!("+{}", n);
                set.insert(CandidateEntry::new(LookupKey::new(n.to_string()), number.clone(), number));
            }
            let entries: Vec<_> = remote
                .iter()
                .map(|n| MatchEntry::new(PhoneHash::derive(&format!("+{}", n))))
                .collect();

            let plan = reconcile(&set, &LookupResult::Matched { entries: entries.clone() });

            prop_assert!(plan.delete_all_existing);
            prop_assert_eq!(plan.inserts.len() + plan.skipped, entries.len());
            prop_assert_eq!(plan.updates.len() + plan.registered.len(), plan.inserts.len());
            let mut inserted = std::collections::HashSet::new();
            for insert in &plan.inserts {
                prop_assert!(set.contains(&insert.hash));
                prop_assert!(inserted.insert(insert.hash));
            }
        }
    }
}
