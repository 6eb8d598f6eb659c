//! What a verifier is handed, and what it reports back.

use casechain_core::{CaseId, ChainEntry, Digest, Mac};
use serde::{Deserialize, Serialize};

/// The chain linkage an exported bundle claims to have.
///
/// Travels alongside the bundle; nothing about it is trusted until checked
/// against the recomputed checksum, the key, and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedLinkage {
    pub checksum: Digest,
    pub prev_checksum: Option<Digest>,
    pub signature: Mac,
}

impl ClaimedLinkage {
    /// The linkage recorded in a chain entry.
    pub fn of_entry(entry: &ChainEntry) -> Self {
        Self {
            checksum: entry.checksum,
            prev_checksum: entry.prev_checksum,
            signature: entry.signature,
        }
    }

    /// Whether a stored entry carries exactly this linkage.
    pub fn matches_entry(&self, entry: &ChainEntry) -> bool {
        self.checksum == entry.checksum
            && self.prev_checksum == entry.prev_checksum
            && self.signature == entry.signature
    }
}

impl From<&ChainEntry> for ClaimedLinkage {
    fn from(entry: &ChainEntry) -> Self {
        Self::of_entry(entry)
    }
}

/// Outcome of verifying one exported bundle.
///
/// Every check is reported independently; a failing check is data, not an
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub case_id: CaseId,
    pub sequence: u64,
    /// Checksum recomputed from the bundle; `None` if it could not be encoded.
    pub checksum: Option<Digest>,
    /// Recomputed checksum equals the claimed checksum.
    #[serde(rename = "match")]
    pub matches: bool,
    /// Claimed signature verifies over the claimed linkage.
    pub signature_match: bool,
    /// Claimed linkage equals the ledger entry at `sequence`.
    pub ledger_match: bool,
    /// The ledger is intact from genesis through `sequence`.
    pub chain_valid: bool,
}

impl VerificationResult {
    /// All checks passed.
    pub fn is_verified(&self) -> bool {
        self.matches && self.signature_match && self.ledger_match && self.chain_valid
    }
}
