//! ChainStore trait: the abstract interface for export ledgers.
//!
//! This trait allows the engine to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use casechain_core::{CaseId, ChainEntry, ChainLink};

use crate::error::{Result, StoreError};

/// The ChainStore trait: async interface for per-case export ledgers.
///
/// # Design Notes
///
/// - **Append-only**: there is no update or delete operation.
/// - **Serialized appends**: for any one case, `append` must compare the
///   candidate against the head and insert as one atomic step. Appends for
///   different cases are independent.
#[async_trait]
pub trait ChainStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// The latest entry of a case, or `None` if it was never exported.
    async fn head(&self, case_id: &CaseId) -> Result<Option<ChainEntry>>;

    /// The entry at a given sequence.
    async fn entry_at(&self, case_id: &CaseId, sequence: u64) -> Result<Option<ChainEntry>>;

    /// Entries with `start <= sequence <= end`, ascending, read as one
    /// consistent snapshot.
    async fn range(&self, case_id: &CaseId, start: u64, end: u64) -> Result<Vec<ChainEntry>>;

    /// Every entry of a case, ascending by sequence.
    async fn all(&self, case_id: &CaseId) -> Result<Vec<ChainEntry>>;

    /// Cases with at least one entry.
    async fn list_cases(&self) -> Result<Vec<CaseId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Append an entry to its case's chain.
    ///
    /// The candidate must occupy exactly `ChainLink::after(head)`. If another
    /// writer committed first, fails with
    /// [`StoreError::ConcurrentModification`] and stores nothing.
    async fn append(&self, entry: &ChainEntry) -> Result<ChainEntry>;
}

#[async_trait]
impl<S: ChainStore + ?Sized> ChainStore for Arc<S> {
    async fn head(&self, case_id: &CaseId) -> Result<Option<ChainEntry>> {
        (**self).head(case_id).await
    }

    async fn entry_at(&self, case_id: &CaseId, sequence: u64) -> Result<Option<ChainEntry>> {
        (**self).entry_at(case_id, sequence).await
    }

    async fn range(&self, case_id: &CaseId, start: u64, end: u64) -> Result<Vec<ChainEntry>> {
        (**self).range(case_id, start, end).await
    }

    async fn all(&self, case_id: &CaseId) -> Result<Vec<ChainEntry>> {
        (**self).all(case_id).await
    }

    async fn list_cases(&self) -> Result<Vec<CaseId>> {
        (**self).list_cases().await
    }

    async fn append(&self, entry: &ChainEntry) -> Result<ChainEntry> {
        (**self).append(entry).await
    }
}

/// Check that `candidate` is the valid successor of `head`.
///
/// Shared by every implementation so they agree on what counts as a
/// stale append.
pub fn check_append(head: Option<&ChainEntry>, candidate: &ChainEntry) -> Result<()> {
    if let Some(h) = head {
        if h.case_id != candidate.case_id {
            return Err(StoreError::InvalidData(format!(
                "head belongs to case {}, candidate to {}",
                h.case_id, candidate.case_id
            )));
        }
    }

    if candidate.link() != ChainLink::after(head) {
        return Err(StoreError::ConcurrentModification {
            case_id: candidate.case_id.clone(),
            attempted: candidate.sequence,
            head: head.map(|h| h.sequence),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use casechain_core::{checksum, SigningKey};

    fn entry(case_id: &str, link: ChainLink, data: &[u8]) -> ChainEntry {
        let key = SigningKey::new(b"k".to_vec()).unwrap();
        ChainEntry::signed(CaseId::new(case_id), link, checksum(data), &key)
    }

    #[test]
    fn test_genesis_accepted_on_empty() {
        let e = entry("C1", ChainLink::GENESIS, b"a");
        assert!(check_append(None, &e).is_ok());
    }

    #[test]
    fn test_stale_genesis_rejected() {
        let head = entry("C1", ChainLink::GENESIS, b"a");
        let stale = entry("C1", ChainLink::GENESIS, b"b");
        let err = check_append(Some(&head), &stale).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrentModification {
                attempted: 0,
                head: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn test_wrong_prev_rejected() {
        let head = entry("C1", ChainLink::GENESIS, b"a");
        let bad = entry(
            "C1",
            ChainLink {
                sequence: 1,
                prev_checksum: Some(checksum(b"other")),
            },
            b"b",
        );
        assert!(check_append(Some(&head), &bad)
            .unwrap_err()
            .is_concurrent_modification());
    }

    #[test]
    fn test_successor_accepted() {
        let head = entry("C1", ChainLink::GENESIS, b"a");
        let next = entry("C1", ChainLink::after(Some(&head)), b"b");
        assert!(check_append(Some(&head), &next).is_ok());
    }
}
