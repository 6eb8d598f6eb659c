//! # casechain core
//!
//! Pure primitives for checksum-chained case exports: the export bundle data
//! model, canonical encoding, SHA-256 checksums, HMAC signatures, and the
//! rules that link one export to the next.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`ExportBundle`] - The unit that is encoded, hashed and chained
//! - [`Digest`] - SHA-256 checksum of a canonically encoded bundle
//! - [`ChainEntry`] - One append-only record in a case's export ledger
//! - [`SigningKey`] / [`Mac`] - Keyed authentication of a chain entry
//!
//! ## Canonicalization
//!
//! Bundles are encoded using deterministic CBOR. See [`canonical`] module.

pub mod canonical;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod signing;
pub mod types;

pub use canonical::{encode, CanonicalBytes};
pub use chain::{audit_links, check_links, ChainAudit, ChainEntry, ChainHealth, ChainLink, LinkFault};
pub use crypto::{checksum, Digest, Mac};
pub use error::{CoreError, EncodingError};
pub use signing::{sign, verify, SigningKey};
pub use types::{
    Case, CaseId, CaseStatus, Entity, EvidenceLink, ExportBundle, ExportFormat, LabelValue,
    Timestamp,
};
