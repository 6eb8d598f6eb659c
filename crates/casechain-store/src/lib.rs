//! # casechain store
//!
//! Storage abstraction for export chains. Provides a trait-based interface
//! for the per-case, append-only ledger with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`ChainStore`] - The async trait for all ledger operations
//! - [`SqliteChainStore`] - SQLite-based persistent storage
//! - [`MemoryChainStore`] - In-memory storage for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use casechain_core::{checksum, CaseId, ChainEntry, ChainLink, SigningKey};
//! use casechain_store::{ChainStore, SqliteChainStore};
//!
//! async fn example() {
//!     let store = SqliteChainStore::open("chains.db").unwrap();
//!     let case_id = CaseId::new("C1");
//!     let key = SigningKey::new(b"export-signing-key".to_vec()).unwrap();
//!
//!     let head = store.head(&case_id).await.unwrap();
//!     let link = ChainLink::after(head.as_ref());
//!     let entry = ChainEntry::signed(case_id, link, checksum(b"bundle"), &key);
//!     store.append(&entry).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Append-only**: entries are never updated or deleted
//! - **Optimistic concurrency**: `append` re-checks the head and rejects a
//!   candidate built against a stale head with `ConcurrentModification`
//! - **Snapshots**: `range` and `all` read in a single operation, so a
//!   reader never sees a half-written chain

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryChainStore;
pub use sqlite::SqliteChainStore;
pub use traits::{check_append, ChainStore};
