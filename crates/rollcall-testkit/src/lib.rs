//! # Rollcall Testkit
//!
//! Testing utilities for Rollcall.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Scripted directory**: A directory client whose answers are chosen by the test
//! - **Fixtures**: In-memory collaborators wired into a synchronizer
//! - **Scenarios**: Reference runs with known outcomes
//! - **Generators**: Proptest strategies for address books and directory behavior
//!
//! ## Scenarios
//!
//! ```rust,ignore
//! use rollcall_testkit::vectors::all_scenarios;
//!
//! for scenario in all_scenarios() {
//!     let (outcome, _harness) = scenario.run().await;
//!     assert_eq!(outcome, scenario.expected, "{}", scenario.name);
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use rollcall_core::RawCandidate;
//! use rollcall_testkit::{DirectoryScript, TestHarness};
//!
//! let harness = TestHarness::new(
//!     vec![RawCandidate::new("+1 555 000 0001", "k1")],
//!     DirectoryScript::MatchAll,
//! );
//! let outcome = harness.synchronizer().run(&CancellationToken::new()).await;
//! ```

pub mod directory;
pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use directory::{DirectoryScript, ScriptedDirectory};
pub use fixtures::{contact, test_config, FixedNormalizer, TestHarness, TEST_ACCOUNT};
pub use vectors::{all_scenarios, Scenario};
