//! External wire shapes: the export artifact and the verification response.
//!
//! Digests and MACs are lower-case hex strings here, as they are persisted or
//! transmitted outside the engine.

use casechain_core::{
    Case, ChainEntry, Digest, Entity, EvidenceLink, ExportBundle, ExportFormat, Mac, Timestamp,
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::verification::{ClaimedLinkage, VerificationResult};

/// An exported bundle together with its chain linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub case: Case,
    pub entities: Vec<Entity>,
    pub evidence: Vec<EvidenceLink>,
    pub exported_at: Timestamp,
    pub format: ExportFormat,
    /// Chain position. Artifacts without it are located by checksum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    pub checksum_sha256: String,
    /// `None` for the first export of a case.
    pub prev_checksum_sha256: Option<String>,
    pub signature_hmac_sha256: String,
}

impl ExportArtifact {
    pub fn new(bundle: &ExportBundle, entry: &ChainEntry) -> Self {
        Self {
            case: bundle.case.clone(),
            entities: bundle.entities.clone(),
            evidence: bundle.evidence.clone(),
            exported_at: bundle.exported_at,
            format: bundle.format,
            sequence: Some(entry.sequence),
            checksum_sha256: entry.checksum.to_hex(),
            prev_checksum_sha256: entry.prev_checksum.map(|d| d.to_hex()),
            signature_hmac_sha256: entry.signature.to_hex(),
        }
    }

    /// The bundle portion, as the verifier will re-encode it.
    pub fn bundle(&self) -> ExportBundle {
        ExportBundle {
            case: self.case.clone(),
            entities: self.entities.clone(),
            evidence: self.evidence.clone(),
            exported_at: self.exported_at,
            format: self.format,
        }
    }

    /// Parse the claimed linkage out of the hex fields.
    pub fn claimed(&self) -> Result<ClaimedLinkage> {
        let checksum = Digest::from_hex(&self.checksum_sha256)
            .map_err(|e| EngineError::Artifact(format!("checksum_sha256: {}", e)))?;
        let prev_checksum = self
            .prev_checksum_sha256
            .as_deref()
            .map(Digest::from_hex)
            .transpose()
            .map_err(|e| EngineError::Artifact(format!("prev_checksum_sha256: {}", e)))?;
        let signature = Mac::from_hex(&self.signature_hmac_sha256)
            .map_err(|e| EngineError::Artifact(format!("signature_hmac_sha256: {}", e)))?;

        Ok(ClaimedLinkage {
            checksum,
            prev_checksum,
            signature,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Artifact(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Artifact(e.to_string()))
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Mismatch,
}

/// Verification result in its external shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    pub status: VerificationStatus,
    pub case_id: String,
    pub sequence: u64,
    /// Recomputed checksum; `None` if the bundle could not be encoded.
    pub checksum_sha256: Option<String>,
    #[serde(rename = "match")]
    pub matches: bool,
    /// The claimed signature that was checked.
    pub signature_hmac_sha256: String,
    pub signature_match: bool,
    pub chain_valid: bool,
}

impl VerificationResponse {
    pub fn new(result: &VerificationResult, claimed: &ClaimedLinkage) -> Self {
        let status = if result.is_verified() {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Mismatch
        };

        Self {
            status,
            case_id: result.case_id.to_string(),
            sequence: result.sequence,
            checksum_sha256: result.checksum.map(|d| d.to_hex()),
            matches: result.matches,
            signature_hmac_sha256: claimed.signature.to_hex(),
            signature_match: result.signature_match,
            chain_valid: result.chain_valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casechain_core::{checksum, CaseId, CaseStatus, ChainLink, SigningKey};

    fn bundle() -> ExportBundle {
        let at = Timestamp::parse("2025-01-02T03:04:05.000006Z").unwrap();
        ExportBundle {
            case: Case {
                id: CaseId::new("C1"),
                title: "Mixer outflows".into(),
                description: String::new(),
                lead_investigator: "j.doe".into(),
                status: CaseStatus::Active,
                created_at: at,
            },
            entities: vec![Entity::new("0xabc", "ethereum").label("risk", 0.75)],
            evidence: vec![],
            exported_at: at,
            format: ExportFormat::Json,
        }
    }

    fn entry(link: ChainLink) -> ChainEntry {
        let key = SigningKey::new(b"artifact-key".to_vec()).unwrap();
        ChainEntry::signed(CaseId::new("C1"), link, checksum(b"bundle"), &key)
    }

    #[test]
    fn test_genesis_artifact_has_null_prev() {
        let artifact = ExportArtifact::new(&bundle(), &entry(ChainLink::GENESIS));
        let json: serde_json::Value = serde_json::from_str(&artifact.to_json().unwrap()).unwrap();

        assert!(json["prev_checksum_sha256"].is_null());
        assert_eq!(json["checksum_sha256"].as_str().unwrap().len(), 64);
        assert_eq!(json["format"], "json");
        assert_eq!(json["exported_at"], "2025-01-02T03:04:05.000006Z");
    }

    #[test]
    fn test_json_round_trip_preserves_linkage() {
        let genesis = entry(ChainLink::GENESIS);
        let second = entry(ChainLink::after(Some(&genesis)));
        let artifact = ExportArtifact::new(&bundle(), &second);

        let parsed = ExportArtifact::from_json(&artifact.to_json().unwrap()).unwrap();
        assert_eq!(parsed, artifact);
        assert_eq!(parsed.bundle(), bundle());
        assert!(parsed.claimed().unwrap().matches_entry(&second));
    }

    #[test]
    fn test_artifact_without_position_parses() {
        let artifact = ExportArtifact::new(&bundle(), &entry(ChainLink::GENESIS));
        let mut json: serde_json::Value = serde_json::to_value(&artifact).unwrap();
        let fields = json.as_object_mut().unwrap();
        fields.remove("sequence");
        fields.remove("prev_checksum_sha256");

        let parsed = ExportArtifact::from_json(&json.to_string()).unwrap();
        assert_eq!(parsed.sequence, None);
        assert_eq!(parsed.prev_checksum_sha256, None);
        assert_eq!(parsed.bundle(), bundle());

        let reserialized = serde_json::to_value(&parsed).unwrap();
        assert!(reserialized.get("sequence").is_none());
    }

    #[test]
    fn test_malformed_hex_rejected() {
        let mut artifact = ExportArtifact::new(&bundle(), &entry(ChainLink::GENESIS));
        artifact.signature_hmac_sha256 = "zz".into();
        assert!(matches!(artifact.claimed(), Err(EngineError::Artifact(_))));

        artifact.signature_hmac_sha256 = "ab".repeat(31);
        assert!(matches!(artifact.claimed(), Err(EngineError::Artifact(_))));
    }

    #[test]
    fn test_response_status() {
        let claimed = ClaimedLinkage::from(&entry(ChainLink::GENESIS));
        let mut result = VerificationResult {
            case_id: CaseId::new("C1"),
            sequence: 0,
            checksum: Some(claimed.checksum),
            matches: true,
            signature_match: true,
            ledger_match: true,
            chain_valid: true,
        };
        let ok = VerificationResponse::new(&result, &claimed);
        assert_eq!(ok.status, VerificationStatus::Verified);
        assert_eq!(serde_json::to_value(&ok).unwrap()["status"], "verified");

        result.matches = false;
        let bad = VerificationResponse::new(&result, &claimed);
        assert_eq!(bad.status, VerificationStatus::Mismatch);
        assert_eq!(serde_json::to_value(&bad).unwrap()["match"], false);
    }
}
