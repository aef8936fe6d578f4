//! SQLite implementation of the store traits.
//!
//! One database backs the address book, the synchronized contacts and the
//! directory mirror. It uses rusqlite with bundled SQLite, wrapped in async
//! via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use rollcall_core::{ContactInsert, LookupKey, PhoneHash, RawCandidate};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{
    BatchReport, ContactBatch, ContactSource, ContactStore, DirectoryMirror, DirectoryUser,
};

/// One SQLite database serving as address book, contact store and mirror.
///
/// Clones share the connection. Every call runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and bring its schema up
    /// to date.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// A private in-memory database, gone when the last clone is dropped.
    pub fn open_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Add or replace an address book entry.
    pub async fn upsert_address_book_entry(
        &self,
        lookup_key: &LookupKey,
        number: &str,
        display_name: Option<&str>,
    ) -> Result<()> {
        let lookup_key = lookup_key.clone();
        let number = number.to_string();
        let display_name = display_name.map(str::to_string);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO address_book (lookup_key, number, display_name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(lookup_key, number) DO UPDATE SET
                    display_name = excluded.display_name",
                params![lookup_key.as_str(), number, display_name],
            )?;
            Ok(())
        })
        .await
    }

    /// Run `f` on the connection from the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// Helper to read a 32-byte hash column
fn hash_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<PhoneHash> {
    let bytes: Vec<u8> = row.get(idx)?;
    PhoneHash::try_from(bytes.as_slice())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectoryUser> {
    Ok(DirectoryUser {
        hash: hash_column(row, 0)?,
        registered: row.get::<_, i64>(1)? != 0,
        status: row.get(2)?,
        last_seen: row.get(3)?,
    })
}

#[async_trait]
impl ContactSource for SqliteStore {
    async fn list_candidate_numbers(&self) -> Result<Vec<RawCandidate>> {
        self.blocking(|conn| {
            let mut stmt = conn.prepare(
                "SELECT number, lookup_key FROM address_book ORDER BY rowid",
            )?;
            let numbers = stmt
                .query_map([], |row| {
                    Ok(RawCandidate {
                        raw_number: row.get(0)?,
                        lookup_key: LookupKey(row.get(1)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(numbers)
        })
        .await
    }
}

#[async_trait]
impl ContactStore for SqliteStore {
    async fn delete_all_synchronized(&self, account: &str) -> Result<usize> {
        let account = account.to_string();

        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM synced_contacts WHERE account = ?1",
                params![account],
            )?;
            Ok(deleted)
        })
        .await
    }

    async fn apply_batch(&self, account: &str, batch: &ContactBatch) -> Result<BatchReport> {
        let account = account.to_string();
        let batch = batch.clone();

        self.blocking(move |conn| {
            // Dropping the transaction on any error rolls it back.
            let tx = conn.transaction()?;
            let mut report = BatchReport::default();

            if batch.delete_all_synchronized {
                report.deleted = tx.execute(
                    "DELETE FROM synced_contacts WHERE account = ?1",
                    params![account],
                )?;
            }

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO synced_contacts (account, hash, display_name, number, lookup_key)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )?;
                for insert in &batch.inserts {
                    stmt.execute(params![
                        account,
                        insert.hash.as_bytes().as_slice(),
                        insert.display_name,
                        insert.normalized_number,
                        insert.lookup_key.as_str(),
                    ])?;
                    report.inserted += 1;
                }
            }

            tx.commit()?;
            Ok(report)
        })
        .await
    }

    async fn resolve_display_name(&self, lookup_key: &LookupKey, fallback: &str) -> String {
        let key = lookup_key.clone();

        let resolved = self
            .blocking(move |conn| {
                let name: Option<String> = conn
                    .query_row(
                        "SELECT display_name FROM address_book
                         WHERE lookup_key = ?1 AND display_name IS NOT NULL
                         LIMIT 1",
                        params![key.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(name)
            })
            .await;

        match resolved {
            Ok(Some(name)) => name,
            Ok(None) => fallback.to_string(),
            Err(e) => {
                tracing::debug!(lookup_key = %lookup_key, error = %e, "display name lookup failed");
                fallback.to_string()
            }
        }
    }

    async fn list_synchronized(&self, account: &str) -> Result<Vec<ContactInsert>> {
        let account = account.to_string();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT hash, display_name, number, lookup_key FROM synced_contacts
                 WHERE account = ?1 ORDER BY id",
            )?;
            let contacts = stmt
                .query_map(params![account], |row| {
                    Ok(ContactInsert {
                        hash: hash_column(row, 0)?,
                        display_name: row.get(1)?,
                        normalized_number: row.get(2)?,
                        lookup_key: LookupKey(row.get(3)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(contacts)
        })
        .await
    }
}

#[async_trait]
impl DirectoryMirror for SqliteStore {
    async fn discard_staged(&self) -> Result<()> {
        self.blocking(|conn| {
            let discarded = conn.execute("DELETE FROM directory_users_staged", [])?;
            if discarded > 0 {
                tracing::debug!(discarded, "dropped uncommitted mirror rows");
            }
            Ok(())
        })
        .await
    }

    async fn update_status(
        &self,
        hash: &PhoneHash,
        status: Option<&str>,
        last_seen: Option<i64>,
    ) -> Result<()> {
        let hash = *hash;
        let status = status.map(str::to_string);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO directory_users_staged (hash, registered, status, last_seen, updated_at)
                 VALUES (?1, 1, ?2, ?3, ?4)
                 ON CONFLICT(hash) DO UPDATE SET
                    registered = 1,
                    status = excluded.status,
                    last_seen = excluded.last_seen,
                    updated_at = excluded.updated_at",
                params![hash.as_bytes().as_slice(), status, last_seen, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn commit(&self) -> Result<()> {
        self.blocking(|conn| {
            let tx = conn.transaction()?;
            let unregistered = tx.execute(
                "UPDATE directory_users SET registered = 0, updated_at = ?1
                 WHERE registered = 1
                   AND hash NOT IN (SELECT hash FROM directory_users_staged)",
                params![now_millis()],
            )?;
            let published = tx.execute(
                "INSERT OR REPLACE INTO directory_users (hash, registered, status, last_seen, updated_at)
                 SELECT hash, registered, status, last_seen, updated_at FROM directory_users_staged",
                [],
            )?;
            tx.execute("DELETE FROM directory_users_staged", [])?;
            tx.commit()?;
            tracing::debug!(published, unregistered, "directory mirror committed");
            Ok(())
        })
        .await
    }

    async fn get_user(&self, hash: &PhoneHash) -> Result<Option<DirectoryUser>> {
        let hash = *hash;

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT hash, registered, status, last_seen FROM directory_users WHERE hash = ?1",
                params![hash.as_bytes().as_slice()],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(number: &str, key: &str) -> ContactInsert {
        ContactInsert {
            display_name: format!("name {}", key),
            normalized_number: number.to_string(),
            hash: PhoneHash::derive(number),
            lookup_key: LookupKey::from(key),
        }
    }

    #[tokio::test]
    async fn test_address_book_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .upsert_address_book_entry(&LookupKey::from("k1"), "+1 555 0000000", Some("Alice"))
            .await
            .unwrap();
        store
            .upsert_address_book_entry(&LookupKey::from("k2"), "333 1234567", None)
            .await
            .unwrap();

        let numbers = store.list_candidate_numbers().await.unwrap();
        assert_eq!(
            numbers,
            vec![
                RawCandidate::new("+1 555 0000000", "k1"),
                RawCandidate::new("333 1234567", "k2"),
            ]
        );

        assert_eq!(store.resolve_display_name(&LookupKey::from("k1"), "x").await, "Alice");
        assert_eq!(store.resolve_display_name(&LookupKey::from("k2"), "x").await, "x");
    }

    #[tokio::test]
    async fn test_apply_batch_replaces_account_contacts() {
        let store = SqliteStore::open_memory().unwrap();
        let first = ContactBatch {
            delete_all_synchronized: false,
            inserts: vec![insert("+1", "a"), insert("+2", "b")],
        };
        store.apply_batch("alice", &first).await.unwrap();
        store
            .apply_batch(
                "bob",
                &ContactBatch {
                    delete_all_synchronized: false,
                    inserts: vec![insert("+9", "z")],
                },
            )
            .await
            .unwrap();

        let second = ContactBatch {
            delete_all_synchronized: true,
            inserts: vec![insert("+3", "c")],
        };
        let report = store.apply_batch("alice", &second).await.unwrap();

        assert_eq!(report, BatchReport { deleted: 2, inserted: 1 });
        assert_eq!(store.list_synchronized("alice").await.unwrap(), vec![insert("+3", "c")]);
        assert_eq!(store.list_synchronized("bob").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        let before = vec![insert("+1", "a")];
        store
            .apply_batch(
                "alice",
                &ContactBatch {
                    delete_all_synchronized: false,
                    inserts: before.clone(),
                },
            )
            .await
            .unwrap();

        // Break the insert statement after the delete has run.
        {
            let conn = store.conn.lock().unwrap();
            conn.execute_batch(
                "CREATE TRIGGER reject_insert BEFORE INSERT ON synced_contacts
                 WHEN NEW.number = '+666'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        }

        let batch = ContactBatch {
            delete_all_synchronized: true,
            inserts: vec![insert("+2", "b"), insert("+666", "c")],
        };
        assert!(store.apply_batch("alice", &batch).await.is_err());
        assert_eq!(store.list_synchronized("alice").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_all_synchronized_counts() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .apply_batch(
                "alice",
                &ContactBatch {
                    delete_all_synchronized: false,
                    inserts: vec![insert("+1", "a"), insert("+2", "b")],
                },
            )
            .await
            .unwrap();

        assert_eq!(store.delete_all_synchronized("alice").await.unwrap(), 2);
        assert_eq!(store.delete_all_synchronized("alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mirror_staging_and_commit() {
        let store = SqliteStore::open_memory().unwrap();
        let hash = PhoneHash::derive("+1");

        store.update_status(&hash, Some("busy"), Some(99)).await.unwrap();
        assert!(store.get_user(&hash).await.unwrap().is_none());

        store.commit().await.unwrap();
        let user = store.get_user(&hash).await.unwrap().unwrap();
        assert_eq!(
            user,
            DirectoryUser {
                hash,
                registered: true,
                status: Some("busy".into()),
                last_seen: Some(99),
            }
        );

        // A commit with nothing staged keeps the record but unregisters it.
        store.commit().await.unwrap();
        let user = store.get_user(&hash).await.unwrap().unwrap();
        assert!(!user.registered);
        assert_eq!(user.status.as_deref(), Some("busy"));
    }

    #[tokio::test]
    async fn test_mirror_commit_replaces_registered_set() {
        let store = SqliteStore::open_memory().unwrap();
        let bare = PhoneHash::derive("+1");
        let dropped = PhoneHash::derive("+2");

        store.mark_registered(&bare).await.unwrap();
        store.update_status(&dropped, Some("hi"), None).await.unwrap();
        store.commit().await.unwrap();
        assert!(store.get_user(&bare).await.unwrap().unwrap().registered);
        assert!(store.get_user(&dropped).await.unwrap().unwrap().registered);

        store.mark_registered(&bare).await.unwrap();
        store.commit().await.unwrap();

        let user = store.get_user(&bare).await.unwrap().unwrap();
        assert!(user.registered);
        assert_eq!(user.status, None);
        assert!(!store.get_user(&dropped).await.unwrap().unwrap().registered);
    }

    #[tokio::test]
    async fn test_discard_staged_drops_uncommitted_rows() {
        let store = SqliteStore::open_memory().unwrap();
        let stale = PhoneHash::derive("+1");

        store.update_status(&stale, Some("old run"), None).await.unwrap();
        store.discard_staged().await.unwrap();
        store.commit().await.unwrap();

        assert!(store.get_user(&stale).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .apply_batch(
                    "alice",
                    &ContactBatch {
                        delete_all_synchronized: false,
                        inserts: vec![insert("+1", "a")],
                    },
                )
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_synchronized("alice").await.unwrap().len(), 1);
    }
}
