//! In-memory implementation of the ChainStore trait.
//!
//! Same semantics as SQLite, no persistence. Each case owns its ledger
//! behind its own lock, so appends to different cases never wait on each
//! other; the outer map lock is only held to find a ledger or to create one
//! together with its genesis entry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use casechain_core::{CaseId, ChainEntry};

use crate::error::{Result, StoreError};
use crate::traits::{check_append, ChainStore};

type Ledger = Arc<RwLock<Vec<ChainEntry>>>;

/// In-memory chain store.
///
/// All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryChainStore {
    ledgers: RwLock<HashMap<CaseId, Ledger>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

fn push_checked(ledger: &Ledger, entry: &ChainEntry) -> Result<()> {
    let mut entries = ledger.write().map_err(poisoned)?;
    check_append(entries.last(), entry)?;
    entries.push(entry.clone());
    Ok(())
}

impl MemoryChainStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self, case_id: &CaseId) -> Result<Option<Ledger>> {
        let ledgers = self.ledgers.read().map_err(poisoned)?;
        Ok(ledgers.get(case_id).cloned())
    }

    /// Append to an existing ledger, or create one if `entry` is a valid
    /// genesis. A rejected entry leaves no ledger behind.
    fn append_or_create(&self, entry: &ChainEntry) -> Result<()> {
        if let Some(ledger) = self.ledger(&entry.case_id)? {
            return push_checked(&ledger, entry);
        }

        let mut ledgers = self.ledgers.write().map_err(poisoned)?;
        // Another writer may have created it since the read above.
        if let Some(ledger) = ledgers.get(&entry.case_id) {
            return push_checked(ledger, entry);
        }
        check_append(None, entry)?;
        ledgers.insert(
            entry.case_id.clone(),
            Arc::new(RwLock::new(vec![entry.clone()])),
        );
        Ok(())
    }

    fn read_entries<T>(&self, case_id: &CaseId, f: impl FnOnce(&[ChainEntry]) -> T) -> Result<T> {
        match self.ledger(case_id)? {
            Some(ledger) => {
                let entries = ledger.read().map_err(poisoned)?;
                Ok(f(&entries))
            }
            None => Ok(f(&[])),
        }
    }
}

#[async_trait]
impl ChainStore for MemoryChainStore {
    async fn head(&self, case_id: &CaseId) -> Result<Option<ChainEntry>> {
        self.read_entries(case_id, |entries| entries.last().cloned())
    }

    async fn entry_at(&self, case_id: &CaseId, sequence: u64) -> Result<Option<ChainEntry>> {
        // Sequences are contiguous from 0, so the sequence is the index.
        self.read_entries(case_id, |entries| {
            usize::try_from(sequence)
                .ok()
                .and_then(|i| entries.get(i))
                .cloned()
        })
    }

    async fn range(&self, case_id: &CaseId, start: u64, end: u64) -> Result<Vec<ChainEntry>> {
        self.read_entries(case_id, |entries| {
            entries
                .iter()
                .filter(|e| e.sequence >= start && e.sequence <= end)
                .cloned()
                .collect()
        })
    }

    async fn all(&self, case_id: &CaseId) -> Result<Vec<ChainEntry>> {
        self.read_entries(case_id, |entries| entries.to_vec())
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        let ledgers = self.ledgers.read().map_err(poisoned)?;
        // Ledgers are only created with their genesis entry.
        let mut cases: Vec<CaseId> = ledgers.keys().cloned().collect();
        cases.sort();
        Ok(cases)
    }

    async fn append(&self, entry: &ChainEntry) -> Result<ChainEntry> {
        self.append_or_create(entry)?;

        tracing::debug!(
            case_id = %entry.case_id,
            sequence = entry.sequence,
            "appended chain entry"
        );
        Ok(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casechain_core::{checksum, ChainLink, SigningKey};

    fn key() -> SigningKey {
        SigningKey::new(b"memory-store-key".to_vec()).unwrap()
    }

    async fn append_next(store: &MemoryChainStore, case_id: &CaseId, data: &[u8]) -> ChainEntry {
        let head = store.head(case_id).await.unwrap();
        let link = ChainLink::after(head.as_ref());
        let entry = ChainEntry::signed(case_id.clone(), link, checksum(data), &key());
        store.append(&entry).await.unwrap()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryChainStore::new();
        let case_id = CaseId::new("C1");

        assert!(store.head(&case_id).await.unwrap().is_none());

        let first = append_next(&store, &case_id, b"one").await;
        assert_eq!(first.sequence, 0);
        assert_eq!(first.prev_checksum, None);

        let second = append_next(&store, &case_id, b"two").await;
        assert_eq!(second.sequence, 1);
        assert_eq!(second.prev_checksum, Some(first.checksum));

        assert_eq!(store.head(&case_id).await.unwrap(), Some(second.clone()));
        assert_eq!(store.entry_at(&case_id, 0).await.unwrap(), Some(first));
        assert_eq!(store.all(&case_id).await.unwrap().len(), 2);
        assert!(store.entry_at(&case_id, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_rejects_stale_append() {
        let store = MemoryChainStore::new();
        let case_id = CaseId::new("C1");
        append_next(&store, &case_id, b"one").await;

        let stale = ChainEntry::signed(case_id.clone(), ChainLink::GENESIS, checksum(b"x"), &key());
        let err = store.append(&stale).await.unwrap_err();
        assert!(err.is_concurrent_modification());
        assert_eq!(store.all(&case_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_cases_independent() {
        let store = MemoryChainStore::new();
        let a = CaseId::new("A");
        let b = CaseId::new("B");

        append_next(&store, &a, b"a0").await;
        append_next(&store, &a, b"a1").await;
        let b0 = append_next(&store, &b, b"b0").await;

        assert_eq!(b0.sequence, 0);
        assert_eq!(store.list_cases().await.unwrap(), vec![a.clone(), b]);
        assert_eq!(store.range(&a, 1, 5).await.unwrap().len(), 1);
        assert!(store.range(&a, u64::MAX - 1, u64::MAX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_genesis_leaves_case_unlisted() {
        let store = MemoryChainStore::new();
        let case_id = CaseId::new("C1");
        let bad = ChainEntry::signed(
            case_id.clone(),
            ChainLink {
                sequence: 3,
                prev_checksum: Some(checksum(b"?")),
            },
            checksum(b"x"),
            &key(),
        );
        assert!(store.append(&bad).await.unwrap_err().is_concurrent_modification());
        assert!(store.list_cases().await.unwrap().is_empty());
        assert!(store.ledgers.read().unwrap().is_empty());

        // A valid genesis afterwards still goes through.
        append_next(&store, &case_id, b"one").await;
        assert_eq!(store.ledgers.read().unwrap().len(), 1);
    }
}
