//! Chain entries: the append-only ledger of a case's exports.
//!
//! Entry `n` of a case carries the checksum of entry `n - 1`, so replaying
//! the entries from genesis detects any rewritten, dropped or reordered
//! export.

use serde::{Deserialize, Serialize};

use crate::crypto::{Digest, Mac};
use crate::signing::{self, SigningKey};
use crate::types::CaseId;

/// One record in a case's export chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEntry {
    pub case_id: CaseId,
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    /// Checksum of the canonically encoded export bundle.
    pub checksum: Digest,
    /// Checksum of the previous entry; `None` iff `sequence == 0`.
    pub prev_checksum: Option<Digest>,
    pub signature: Mac,
}

impl ChainEntry {
    /// Assemble an entry at the given chain position.
    pub fn new(case_id: CaseId, link: ChainLink, checksum: Digest, signature: Mac) -> Self {
        Self {
            case_id,
            sequence: link.sequence,
            checksum,
            prev_checksum: link.prev_checksum,
            signature,
        }
    }

    /// Build and sign an entry at the given chain position.
    pub fn signed(case_id: CaseId, link: ChainLink, checksum: Digest, key: &SigningKey) -> Self {
        let signature = signing::sign(
            &case_id,
            link.sequence,
            &checksum,
            link.prev_checksum.as_ref(),
            key,
        );
        Self::new(case_id, link, checksum, signature)
    }

    /// The position this entry occupies.
    pub fn link(&self) -> ChainLink {
        ChainLink {
            sequence: self.sequence,
            prev_checksum: self.prev_checksum,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
    }

    /// Check the stored signature against a key.
    pub fn verify_signature(&self, key: &SigningKey) -> bool {
        signing::verify(
            &self.case_id,
            self.sequence,
            &self.checksum,
            self.prev_checksum.as_ref(),
            &self.signature,
            key,
        )
    }
}

/// The `(sequence, prev_checksum)` pair the next entry must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    pub sequence: u64,
    pub prev_checksum: Option<Digest>,
}

impl ChainLink {
    /// Position of a case's first export.
    pub const GENESIS: Self = Self {
        sequence: 0,
        prev_checksum: None,
    };

    /// The link that follows the given head (genesis if there is none).
    pub fn after(head: Option<&ChainEntry>) -> Self {
        match head {
            Some(entry) => Self {
                sequence: entry.sequence + 1,
                prev_checksum: Some(entry.checksum),
            },
            None => Self::GENESIS,
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.sequence == 0
    }
}

/// Why a chain walk stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkFault {
    /// The entry belongs to another case.
    ForeignEntry { found: CaseId },
    /// Sequence numbers are not contiguous from 0.
    SequenceGap { expected: u64, found: u64 },
    /// The genesis entry claims a predecessor.
    GenesisHasPrev,
    /// The entry does not carry the previous entry's checksum.
    PrevMismatch {
        expected: Digest,
        found: Option<Digest>,
    },
}

/// Result of walking a chain from genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainHealth {
    /// Every link holds.
    Intact,
    /// The first broken link.
    Broken { at_sequence: u64, fault: LinkFault },
}

impl ChainHealth {
    pub fn is_intact(&self) -> bool {
        matches!(self, ChainHealth::Intact)
    }
}

/// Full-chain audit report for one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAudit {
    pub case_id: CaseId,
    /// Number of entries examined.
    pub length: u64,
    pub health: ChainHealth,
    /// Sequences whose stored signature does not verify.
    pub invalid_signatures: Vec<u64>,
}

impl ChainAudit {
    /// Linkage intact and every signature verified.
    pub fn is_valid(&self) -> bool {
        self.health.is_intact() && self.invalid_signatures.is_empty()
    }
}

/// Walk entries from genesis and report the first broken link.
///
/// `entries` must be the case's chain in ascending order starting at
/// sequence 0. An empty slice is trivially intact.
pub fn check_links(case_id: &CaseId, entries: &[ChainEntry]) -> ChainHealth {
    let mut prev: Option<&ChainEntry> = None;

    for (index, entry) in entries.iter().enumerate() {
        let expected_seq = index as u64;

        if &entry.case_id != case_id {
            return ChainHealth::Broken {
                at_sequence: expected_seq,
                fault: LinkFault::ForeignEntry {
                    found: entry.case_id.clone(),
                },
            };
        }

        if entry.sequence != expected_seq {
            return ChainHealth::Broken {
                at_sequence: expected_seq,
                fault: LinkFault::SequenceGap {
                    expected: expected_seq,
                    found: entry.sequence,
                },
            };
        }

        match prev {
            None => {
                if entry.prev_checksum.is_some() {
                    return ChainHealth::Broken {
                        at_sequence: entry.sequence,
                        fault: LinkFault::GenesisHasPrev,
                    };
                }
            }
            Some(p) => {
                if entry.prev_checksum != Some(p.checksum) {
                    return ChainHealth::Broken {
                        at_sequence: entry.sequence,
                        fault: LinkFault::PrevMismatch {
                            expected: p.checksum,
                            found: entry.prev_checksum,
                        },
                    };
                }
            }
        }

        prev = Some(entry);
    }

    ChainHealth::Intact
}

/// Replay a case's chain: linkage plus every stored signature.
pub fn audit_links(case_id: &CaseId, entries: &[ChainEntry], key: &SigningKey) -> ChainAudit {
    let invalid_signatures = entries
        .iter()
        .filter(|e| !e.verify_signature(key))
        .map(|e| e.sequence)
        .collect();

    ChainAudit {
        case_id: case_id.clone(),
        length: entries.len() as u64,
        health: check_links(case_id, entries),
        invalid_signatures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::checksum;

    fn key() -> SigningKey {
        SigningKey::new(b"chain-test-key".to_vec()).unwrap()
    }

    fn build_chain(case_id: &CaseId, n: usize) -> Vec<ChainEntry> {
        let mut entries: Vec<ChainEntry> = Vec::new();
        for i in 0..n {
            let link = ChainLink::after(entries.last());
            let c = checksum(format!("export {i}").as_bytes());
            entries.push(ChainEntry::signed(case_id.clone(), link, c, &key()));
        }
        entries
    }

    #[test]
    fn test_link_after_none_is_genesis() {
        assert_eq!(ChainLink::after(None), ChainLink::GENESIS);
        assert!(ChainLink::GENESIS.is_genesis());
    }

    #[test]
    fn test_link_after_head() {
        let case_id = CaseId::new("C1");
        let chain = build_chain(&case_id, 2);
        let next = ChainLink::after(chain.last());
        assert_eq!(next.sequence, 2);
        assert_eq!(next.prev_checksum, Some(chain[1].checksum));
    }

    #[test]
    fn test_intact_chain() {
        let case_id = CaseId::new("C1");
        let chain = build_chain(&case_id, 4);
        assert!(check_links(&case_id, &chain).is_intact());
        assert!(audit_links(&case_id, &chain, &key()).is_valid());
        assert!(check_links(&case_id, &[]).is_intact());
    }

    #[test]
    fn test_corrupted_checksum_breaks_next_link() {
        let case_id = CaseId::new("C1");
        let mut chain = build_chain(&case_id, 3);
        chain[0].checksum = checksum(b"forged");

        match check_links(&case_id, &chain) {
            ChainHealth::Broken { at_sequence, fault } => {
                assert_eq!(at_sequence, 1);
                assert!(matches!(fault, LinkFault::PrevMismatch { .. }));
            }
            ChainHealth::Intact => panic!("expected broken chain"),
        }
    }

    #[test]
    fn test_gap_detected() {
        let case_id = CaseId::new("C1");
        let mut chain = build_chain(&case_id, 3);
        chain.remove(1);

        assert_eq!(
            check_links(&case_id, &chain),
            ChainHealth::Broken {
                at_sequence: 1,
                fault: LinkFault::SequenceGap { expected: 1, found: 2 },
            }
        );
    }

    #[test]
    fn test_genesis_with_prev_detected() {
        let case_id = CaseId::new("C1");
        let mut chain = build_chain(&case_id, 1);
        chain[0].prev_checksum = Some(checksum(b"ghost"));

        assert_eq!(
            check_links(&case_id, &chain),
            ChainHealth::Broken {
                at_sequence: 0,
                fault: LinkFault::GenesisHasPrev,
            }
        );
    }

    #[test]
    fn test_foreign_entry_detected() {
        let case_id = CaseId::new("C1");
        let mut chain = build_chain(&case_id, 2);
        chain[1].case_id = CaseId::new("C2");

        assert!(matches!(
            check_links(&case_id, &chain),
            ChainHealth::Broken {
                at_sequence: 1,
                fault: LinkFault::ForeignEntry { .. }
            }
        ));
    }

    #[test]
    fn test_audit_reports_bad_signatures() {
        let case_id = CaseId::new("C1");
        let mut chain = build_chain(&case_id, 3);
        chain[2].signature = Mac::from_bytes([0u8; 32]);

        let audit = audit_links(&case_id, &chain, &key());
        assert!(audit.health.is_intact());
        assert_eq!(audit.invalid_signatures, vec![2]);
        assert!(!audit.is_valid());
        assert_eq!(audit.length, 3);
    }
}
