//! Error types for the store module.

use casechain_core::CaseId;
use thiserror::Error;

/// Errors that can occur during chain store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The head moved between the caller's read and the append.
    ///
    /// Transient: re-read the head and try again.
    #[error(
        "concurrent modification of case {case_id}: attempted sequence {attempted}, head is {head:?}"
    )]
    ConcurrentModification {
        case_id: CaseId,
        attempted: u64,
        head: Option<u64>,
    },

    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl StoreError {
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, StoreError::ConcurrentModification { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
