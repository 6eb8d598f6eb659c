//! # casechain
//!
//! Checksum-chained export integrity for investigation cases.
//!
//! Every export of a case is canonically encoded, checksummed with SHA-256,
//! linked to the checksum of the case's previous export, and signed with
//! HMAC-SHA256. The resulting per-case chain is append-only, so any later
//! modification, reordering, truncation or substitution of an export is
//! detectable.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use casechain::{CaseStore, Engine, EngineConfig, SecretProvider};
//! use casechain::core::CaseId;
//! use casechain::store::SqliteChainStore;
//!
//! async fn example(cases: Arc<dyn CaseStore>, secrets: Arc<dyn SecretProvider>) {
//!     let store = SqliteChainStore::open("chains.db").unwrap();
//!     let engine = Engine::new(store, cases, secrets, EngineConfig::default());
//!
//!     let case_id = CaseId::new("C1");
//!     let artifact = engine
//!         .export_artifact(&case_id, engine.config().default_format)
//!         .await
//!         .unwrap();
//!
//!     let response = engine.verify_response(&artifact).await.unwrap();
//!     println!("{}", serde_json::to_string(&response).unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `casechain::core` - Data model, encoding, checksums, signatures
//! - `casechain::store` - Chain store abstraction and SQLite

pub mod artifact;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod verification;

pub use casechain_core as core;
pub use casechain_store as store;

pub use artifact::{ExportArtifact, VerificationResponse, VerificationStatus};
pub use collaborators::{CaseStore, SecretProvider};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use verification::{ClaimedLinkage, VerificationResult};

pub use casechain_core::{
    Case, CaseId, CaseStatus, ChainAudit, ChainEntry, ChainHealth, Digest, Entity, EvidenceLink,
    ExportBundle, ExportFormat, LabelValue, Mac, SigningKey, Timestamp,
};
