//! Proptest generators for property-based testing.

use proptest::prelude::*;

use rollcall_core::{ContactInsert, RawCandidate};

use crate::directory::DirectoryScript;
use crate::fixtures::contact;

/// Generate a ten-digit North American national number.
pub fn national_number() -> impl Strategy<Value = String> {
    "[2-9][0-9]{9}".prop_map(String::from)
}

/// Write `national` the way a user might, for calling code `1`.
pub fn format_number(national: &str, style: u8) -> String {
    let (area, rest) = national.split_at(3);
    let (exchange, line) = rest.split_at(3);
    match style % 4 {
        0 => national.to_string(),
        1 => format!("+1 {} {} {}", area, exchange, line),
        2 => format!("({}) {}-{}", area, exchange, line),
        _ => format!("001{}", national),
    }
}

/// The E.164 form every style of [`format_number`] normalizes to.
pub fn e164(national: &str) -> String {
    format!("+1{}", national)
}

/// Generate an address book drawing from a small pool of numbers, so that
/// duplicates (in varying formats) are common.
pub fn address_book(max_len: usize) -> impl Strategy<Value = Vec<RawCandidate>> {
    prop::collection::vec(national_number(), 1..=6).prop_flat_map(move |pool| {
        let len = pool.len();
        prop::collection::vec((0..len, any::<u8>()), 1..=max_len).prop_map(move |picks| {
            picks
                .into_iter()
                .enumerate()
                .map(|(i, (n, style))| {
                    RawCandidate::new(format_number(&pool[n], style), format!("k{}", i).as_str())
                })
                .collect()
        })
    })
}

/// Generate an address book with nothing eligible for lookup.
pub fn ineligible_address_book() -> impl Strategy<Value = Vec<RawCandidate>> {
    prop::collection::vec("[0-9]{0,3}", 0..8).prop_map(|numbers| {
        numbers
            .into_iter()
            .enumerate()
            .map(|(i, n)| RawCandidate::new(n, format!("short{}", i).as_str()))
            .collect()
    })
}

/// Generate contacts a previous run would have left behind.
pub fn previous_contacts(max_len: usize) -> impl Strategy<Value = Vec<ContactInsert>> {
    prop::collection::vec(national_number(), 0..=max_len).prop_map(|numbers| {
        numbers
            .iter()
            .enumerate()
            .map(|(i, n)| contact(&e164(n), &format!("old{}", i)))
            .collect()
    })
}

/// Generate a directory behavior that leaves the directory state unknown.
pub fn uncertain_script() -> impl Strategy<Value = DirectoryScript> {
    prop_oneof![
        "[a-z ]{0,16}".prop_map(DirectoryScript::Error),
        Just(DirectoryScript::Silent),
        Just(DirectoryScript::Unavailable),
        Just(DirectoryScript::Payload(vec![0xff])),
        Just(DirectoryScript::Payload(b"not cbor at all".to_vec())),
    ]
}
