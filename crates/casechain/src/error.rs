//! Error types for the engine.

use casechain_core::{CaseId, EncodingError};
use casechain_store::StoreError;
use thiserror::Error;

/// Errors that can occur during export and verification.
///
/// A bundle that does not match its claimed checksum or signature is not an
/// error; that outcome is reported in
/// [`VerificationResult`](crate::VerificationResult).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The bundle could not be canonically encoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The case store has no such case, or the case has no export chain.
    #[error("case not found: {0}")]
    CaseNotFound(CaseId),

    /// The case's chain has no entry at this sequence. `None` when the
    /// position was looked up by checksum and nothing matched.
    #[error("{} not found in chain of case {case_id}", position(.sequence))]
    SequenceNotFound {
        case_id: CaseId,
        sequence: Option<u64>,
    },

    /// Every append attempt lost the race for the chain head.
    #[error("gave up appending to case {case_id} after {attempts} attempts")]
    AppendRetriesExhausted { case_id: CaseId, attempts: u32 },

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The case store failed.
    #[error("case store error: {0:#}")]
    CaseStore(anyhow::Error),

    /// The secret provider failed.
    #[error("secret provider error: {0:#}")]
    SecretProvider(anyhow::Error),

    /// An export artifact is malformed.
    #[error("invalid export artifact: {0}")]
    Artifact(String),

    /// Engine configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn position(sequence: &Option<u64>) -> String {
    match sequence {
        Some(n) => format!("sequence {n}"),
        None => "claimed checksum".to_string(),
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
