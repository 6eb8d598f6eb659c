//! Golden test vectors for the export format.
//!
//! A fixed bundle with its expected canonical checksum and signatures. If any
//! of these change, every checksum already recorded in a chain is invalid.

use casechain_core::{
    Case, CaseId, CaseStatus, Entity, EvidenceLink, ExportBundle, ExportFormat, LabelValue,
    SigningKey, Timestamp,
};

/// Case id of the golden bundle.
pub const GOLDEN_CASE: &str = "CASE-2025-001";

/// Key the golden signatures were produced with.
pub const GOLDEN_KEY: &[u8] = b"casechain-test-vector-key";

/// One export of the golden case, at a fixed chain position.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    pub name: &'static str,
    pub sequence: u64,
    pub format: ExportFormat,
    pub exported_at: &'static str,
    /// Size of the canonical encoding.
    pub encoded_len: usize,
    pub checksum: &'static str,
    pub signature: &'static str,
}

/// Two consecutive exports of the golden case.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "genesis json export",
            sequence: 0,
            format: ExportFormat::Json,
            exported_at: "2025-02-01T00:00:00.000000Z",
            encoded_len: 486,
            checksum: "817bc9e7b97c1678aab4fab51767e3f97d0bee7059e4b0462f8d892701a74881",
            signature: "aad3f6e0f117272a22347431ef9dfc1a34c92cead15b60a89d42c54044b4d909",
        },
        GoldenVector {
            name: "second csv export",
            sequence: 1,
            format: ExportFormat::Csv,
            exported_at: "2025-02-02T00:00:00.000000Z",
            encoded_len: 485,
            checksum: "484ba28cfbcc0daa4ff98a1d4d47273c464ca1a05f74fdd17b732e369a9ec223",
            signature: "d2e993d3ff8a24cb80e3666b231bb4ccb2051bba02380384f8f56657a16d731f",
        },
    ]
}

pub fn golden_key() -> SigningKey {
    SigningKey::new(GOLDEN_KEY.to_vec()).expect("golden key is not empty")
}

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap_or_else(|e| panic!("golden timestamp {s:?}: {e}"))
}

/// The golden bundle as exported in the given format at the given time.
pub fn golden_bundle(format: ExportFormat, exported_at: &str) -> ExportBundle {
    ExportBundle {
        case: Case {
            id: CaseId::new(GOLDEN_CASE),
            title: "Bridge exploit".into(),
            description: "Funds traced through two bridges".into(),
            lead_investigator: "a.lee".into(),
            status: CaseStatus::Active,
            created_at: ts("2025-01-15T09:30:00Z"),
        },
        entities: vec![
            Entity::new("0xdeadbeef", "ethereum")
                .label("cluster", 7i64)
                .label("risk", 0.75)
                .label("sanctioned", true)
                .label("note", LabelValue::Null),
            Entity::new("bc1qxyz", "bitcoin"),
        ],
        evidence: vec![EvidenceLink {
            resource_id: "tx-001".into(),
            resource_type: "transaction".into(),
            content_hash: Some("ab12".into()),
            notes: "first hop".into(),
            linked_at: ts("2025-01-16T10:00:00.123456Z"),
        }],
        exported_at: ts(exported_at),
        format,
    }
}

/// The bundle a vector describes.
pub fn bundle_for(vector: &GoldenVector) -> ExportBundle {
    golden_bundle(vector.format, vector.exported_at)
}
