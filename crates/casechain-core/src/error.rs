//! Error types for casechain core.

use thiserror::Error;

/// A bundle field could not be normalized for canonical encoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("non-finite number in label {key:?}: {value}")]
    NonFiniteNumber { key: String, value: f64 },

    #[error("timestamp cannot be represented in ISO-8601: {0}")]
    UnrepresentableTimestamp(String),

    #[error("case identifier is empty")]
    EmptyCaseId,

    #[error("unsupported value in canonical encoding: {0}")]
    UnsupportedValue(&'static str),
}

/// Core errors for parsing identifiers, digests and MACs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("invalid case status: {0}")]
    InvalidStatus(String),

    #[error("invalid export format: {0}")]
    InvalidFormat(String),

    #[error("signing key must not be empty")]
    EmptyKey,
}
