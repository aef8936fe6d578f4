//! Schema setup for the SQLite store.
//!
//! The schema version lives in SQLite's `user_version` pragma. Step `i` of
//! [`STEPS`] upgrades a database from version `i` to `i + 1`; all pending
//! steps run in one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Upgrade steps, oldest first.
const STEPS: &[&str] = &[
    // 1: address book, synchronized contacts, directory mirror
    r#"
    CREATE TABLE address_book (
        lookup_key TEXT NOT NULL,
        number TEXT NOT NULL,             -- as the user typed it
        display_name TEXT,
        PRIMARY KEY (lookup_key, number)
    );

    CREATE TABLE synced_contacts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account TEXT NOT NULL,
        hash BLOB NOT NULL,               -- Blake3 of the normalized number
        display_name TEXT NOT NULL,
        number TEXT NOT NULL,             -- normalized
        lookup_key TEXT NOT NULL
    );

    CREATE TABLE directory_users (
        hash BLOB PRIMARY KEY,
        registered INTEGER NOT NULL DEFAULT 0,
        status TEXT,
        last_seen INTEGER,                -- Unix ms
        updated_at INTEGER NOT NULL
    );

    -- written by update_status, moved to directory_users on commit
    CREATE TABLE directory_users_staged (
        hash BLOB PRIMARY KEY,
        registered INTEGER NOT NULL DEFAULT 0,
        status TEXT,
        last_seen INTEGER,
        updated_at INTEGER NOT NULL
    );

    CREATE INDEX idx_synced_contacts_account ON synced_contacts(account);
    CREATE INDEX idx_address_book_lookup ON address_book(lookup_key);
    "#,
];

/// Schema version this build writes.
pub fn schema_version() -> u32 {
    STEPS.len() as u32
}

/// Bring the schema of `conn` up to [`schema_version`].
///
/// A database that is already current is left alone; one written by a newer
/// build is rejected.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let found: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let target = schema_version();

    if found > target {
        return Err(StoreError::Schema(format!(
            "database is at version {}, this build supports up to {}",
            found, target
        )));
    }
    if found == target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in &STEPS[found as usize..] {
        tx.execute_batch(step)?;
    }
    tx.pragma_update(None, "user_version", target)?;
    tx.commit()?;

    tracing::debug!(from = found, to = target, "store schema upgraded");
    Ok(())
}

/// Wall-clock time in Unix milliseconds, 0 if the clock is before the epoch.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
