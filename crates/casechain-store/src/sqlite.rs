//! SQLite implementation of the ChainStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use casechain_core::{CaseId, ChainEntry, Digest, Mac};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_micros};
use crate::traits::{check_append, ChainStore};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_ENTRY: &str =
    "SELECT case_id, sequence, checksum, prev_checksum, signature FROM chain_entries";

/// SQLite-based chain store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteChainStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChainStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(format!("connection mutex: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

fn to_sql_seq(sequence: u64) -> Result<i64> {
    i64::try_from(sequence)
        .map_err(|_| StoreError::InvalidData(format!("sequence {} out of range", sequence)))
}

fn blob_error(idx: usize, e: casechain_core::CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Blob, Box::new(e))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChainEntry> {
    let case_id: String = row.get(0)?;
    let sequence: i64 = row.get(1)?;
    let checksum: Vec<u8> = row.get(2)?;
    let prev_checksum: Option<Vec<u8>> = row.get(3)?;
    let signature: Vec<u8> = row.get(4)?;

    let sequence = u64::try_from(sequence)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(1, sequence))?;

    Ok(ChainEntry {
        case_id: CaseId::new(case_id),
        sequence,
        checksum: Digest::try_from(checksum.as_slice()).map_err(|e| blob_error(2, e))?,
        prev_checksum: prev_checksum
            .map(|b| Digest::try_from(b.as_slice()))
            .transpose()
            .map_err(|e| blob_error(3, e))?,
        signature: Mac::try_from(signature.as_slice()).map_err(|e| blob_error(4, e))?,
    })
}

fn query_head(conn: &Connection, case_id: &str) -> Result<Option<ChainEntry>> {
    let sql = format!("{SELECT_ENTRY} WHERE case_id = ?1 ORDER BY sequence DESC LIMIT 1");
    Ok(conn.query_row(&sql, params![case_id], row_to_entry).optional()?)
}

fn is_primary_key_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[async_trait]
impl ChainStore for SqliteChainStore {
    async fn head(&self, case_id: &CaseId) -> Result<Option<ChainEntry>> {
        let case_id = case_id.clone();
        self.run(move |conn| query_head(conn, case_id.as_str())).await
    }

    async fn entry_at(&self, case_id: &CaseId, sequence: u64) -> Result<Option<ChainEntry>> {
        let case_id = case_id.clone();
        let Ok(seq) = i64::try_from(sequence) else {
            return Ok(None);
        };
        self.run(move |conn| {
            let sql = format!("{SELECT_ENTRY} WHERE case_id = ?1 AND sequence = ?2");
            Ok(conn
                .query_row(&sql, params![case_id.as_str(), seq], row_to_entry)
                .optional()?)
        })
        .await
    }

    async fn range(&self, case_id: &CaseId, start: u64, end: u64) -> Result<Vec<ChainEntry>> {
        if start > end {
            return Ok(Vec::new());
        }
        // Nothing is stored past i64::MAX.
        let Ok(start) = i64::try_from(start) else {
            return Ok(Vec::new());
        };
        let case_id = case_id.clone();
        let end = i64::try_from(end).unwrap_or(i64::MAX);
        self.run(move |conn| {
            let sql = format!(
                "{SELECT_ENTRY} WHERE case_id = ?1 AND sequence BETWEEN ?2 AND ?3 ORDER BY sequence"
            );
            let mut stmt = conn.prepare(&sql)?;
            let entries = stmt
                .query_map(params![case_id.as_str(), start, end], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn all(&self, case_id: &CaseId) -> Result<Vec<ChainEntry>> {
        self.range(case_id, 0, u64::MAX).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT case_id FROM chain_entries ORDER BY case_id")?;
            let cases = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .map(|r| r.map(CaseId::new))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(cases)
        })
        .await
    }

    async fn append(&self, entry: &ChainEntry) -> Result<ChainEntry> {
        let entry = entry.clone();
        self.run(move |conn| {
            // IMMEDIATE takes the write lock up front, so the head read and
            // the insert cannot interleave with another writer.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let head = query_head(&tx, entry.case_id.as_str())?;
            check_append(head.as_ref(), &entry)?;

            let inserted = tx.execute(
                "INSERT INTO chain_entries
                    (case_id, sequence, checksum, prev_checksum, signature, appended_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.case_id.as_str(),
                    to_sql_seq(entry.sequence)?,
                    entry.checksum.as_bytes().as_slice(),
                    entry.prev_checksum.as_ref().map(|d| d.as_bytes().to_vec()),
                    entry.signature.as_bytes().as_slice(),
                    now_micros(),
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(e) if is_primary_key_violation(&e) => {
                    tracing::warn!(
                        case_id = %entry.case_id,
                        sequence = entry.sequence,
                        "chain position taken by another writer"
                    );
                    return Err(StoreError::ConcurrentModification {
                        case_id: entry.case_id.clone(),
                        attempted: entry.sequence,
                        head: head.map(|h| h.sequence),
                    });
                }
                Err(e) => return Err(e.into()),
            }

            tx.commit()?;

            tracing::debug!(
                case_id = %entry.case_id,
                sequence = entry.sequence,
                checksum = %entry.checksum.short(),
                "appended chain entry"
            );
            Ok(entry)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casechain_core::{checksum, ChainLink, SigningKey};

    fn key() -> SigningKey {
        SigningKey::new(b"sqlite-store-key".to_vec()).unwrap()
    }

    async fn append_next(store: &SqliteChainStore, case_id: &CaseId, data: &[u8]) -> ChainEntry {
        let head = store.head(case_id).await.unwrap();
        let entry = ChainEntry::signed(
            case_id.clone(),
            ChainLink::after(head.as_ref()),
            checksum(data),
            &key(),
        );
        store.append(&entry).await.unwrap()
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = SqliteChainStore::open_memory().unwrap();
        let case_id = CaseId::new("C1");

        let first = append_next(&store, &case_id, b"one").await;
        let second = append_next(&store, &case_id, b"two").await;

        assert_eq!(second.sequence, 1);
        assert_eq!(second.prev_checksum, Some(first.checksum));
        assert_eq!(store.head(&case_id).await.unwrap(), Some(second.clone()));
        assert_eq!(store.entry_at(&case_id, 0).await.unwrap(), Some(first.clone()));
        assert_eq!(store.all(&case_id).await.unwrap(), vec![first, second]);
        assert!(store.entry_at(&case_id, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_append_rejected() {
        let store = SqliteChainStore::open_memory().unwrap();
        let case_id = CaseId::new("C1");
        append_next(&store, &case_id, b"one").await;

        let stale = ChainEntry::signed(case_id.clone(), ChainLink::GENESIS, checksum(b"x"), &key());
        let err = store.append(&stale).await.unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(store.all(&case_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_range_and_list_cases() {
        let store = SqliteChainStore::open_memory().unwrap();
        let a = CaseId::new("A");
        let b = CaseId::new("B");
        for i in 0..4u8 {
            append_next(&store, &a, &[i]).await;
        }
        append_next(&store, &b, b"b").await;

        let mid = store.range(&a, 1, 2).await.unwrap();
        assert_eq!(mid.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert!(store.range(&a, 3, 1).await.unwrap().is_empty());
        assert!(store.range(&a, u64::MAX - 1, u64::MAX).await.unwrap().is_empty());
        assert_eq!(store.list_cases().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chains.db");
        let case_id = CaseId::new("C1");

        let written = {
            let store = SqliteChainStore::open(&path).unwrap();
            append_next(&store, &case_id, b"one").await;
            append_next(&store, &case_id, b"two").await
        };

        let store = SqliteChainStore::open(&path).unwrap();
        assert_eq!(store.head(&case_id).await.unwrap(), Some(written));
        assert_eq!(store.all(&case_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ledger_rejects_update_and_delete() {
        let store = SqliteChainStore::open_memory().unwrap();
        let case_id = CaseId::new("C1");
        append_next(&store, &case_id, b"one").await;

        {
            let conn = store.conn.lock().unwrap();
            assert!(conn
                .execute("UPDATE chain_entries SET checksum = x'00'", [])
                .is_err());
            assert!(conn.execute("DELETE FROM chain_entries", []).is_err());
        }

        assert_eq!(store.all(&case_id).await.unwrap().len(), 1);
    }
}
