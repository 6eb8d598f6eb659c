//! # casechain testkit
//!
//! Testing utilities for casechain.
//!
//! This crate provides:
//!
//! - **Fixtures**: an in-memory case store, a static secret provider, and a
//!   ready-made engine over any chain store
//! - **Fault injection**: chain store wrappers that corrupt stored entries or
//!   lose append races on demand, and collaborators whose backends are down
//! - **Generators**: Proptest strategies for bundles and their parts
//! - **Golden vectors**: a fixed bundle with its expected checksums and
//!   signatures
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use casechain_store::MemoryChainStore;
//! use casechain_testkit::fixtures::{TestFixture, SAMPLE_CASE};
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let engine = fixture.engine(MemoryChainStore::new());
//!     let (bundle, entry) = engine.export(&SAMPLE_CASE.into()).await.unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use casechain_testkit::generators::bundle;
//!
//! proptest! {
//!     #[test]
//!     fn checksum_is_deterministic(b in bundle()) {
//!         prop_assert_eq!(encode(&b).unwrap(), encode(&b.clone()).unwrap());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    ConflictingChainStore, InMemoryCaseStore, StaticSecretProvider, TamperingChainStore,
    TestFixture, UnavailableCaseStore, UnavailableSecretProvider,
};
pub use vectors::{golden_bundle, golden_key, GOLDEN_CASE};
