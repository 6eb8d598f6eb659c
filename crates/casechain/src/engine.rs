//! The Engine: export and verification services.
//!
//! Export pulls a case from the case store, encodes and checksums it, links
//! it to the case's chain head, signs the link, and appends it. Verification
//! recomputes the checksum and checks the claimed linkage against the key and
//! the ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use casechain_core::{
    audit_links, check_links, encode, signing, CaseId, ChainAudit, ChainEntry, ChainHealth,
    ChainLink, Digest, ExportBundle, ExportFormat, SigningKey, Timestamp,
};
use casechain_store::ChainStore;

use crate::artifact::{ExportArtifact, VerificationResponse};
use crate::collaborators::{CaseStore, SecretProvider};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::verification::{ClaimedLinkage, VerificationResult};

type CaseLock = Arc<tokio::sync::Mutex<()>>;

/// Export and verification over one chain store.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct Engine<S: ChainStore> {
    chain: Arc<S>,
    cases: Arc<dyn CaseStore>,
    secrets: Arc<dyn SecretProvider>,
    config: EngineConfig,
    /// In-process queue per case, used when `serialize_exports` is on.
    case_locks: Mutex<HashMap<CaseId, CaseLock>>,
}

impl<S: ChainStore> Engine<S> {
    pub fn new(
        chain: S,
        cases: Arc<dyn CaseStore>,
        secrets: Arc<dyn SecretProvider>,
        config: EngineConfig,
    ) -> Self {
        Self::with_shared_store(Arc::new(chain), cases, secrets, config)
    }

    /// Build an engine over a store that is also used elsewhere.
    pub fn with_shared_store(
        chain: Arc<S>,
        cases: Arc<dyn CaseStore>,
        secrets: Arc<dyn SecretProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            chain,
            cases,
            secrets,
            config,
            case_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.chain
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────────

    /// Export a case in the configured default format.
    pub async fn export(&self, case_id: &CaseId) -> Result<(ExportBundle, ChainEntry)> {
        self.export_as(case_id, self.config.default_format).await
    }

    /// Export a case, append it to the case's chain, and return the bundle
    /// with its new chain entry.
    pub async fn export_as(
        &self,
        case_id: &CaseId,
        format: ExportFormat,
    ) -> Result<(ExportBundle, ChainEntry)> {
        let _queued = if self.config.serialize_exports {
            Some(self.case_lock(case_id).lock_owned().await)
        } else {
            None
        };

        let bundle = self.assemble(case_id, format).await?;
        let checksum = Digest::of(&encode(&bundle)?);
        let key = self.signing_key(case_id).await?;

        let entry = self.append_linked(case_id, checksum, &key).await?;

        tracing::info!(
            case_id = %case_id,
            sequence = entry.sequence,
            checksum = %entry.checksum.short(),
            format = format.as_str(),
            "exported case"
        );
        Ok((bundle, entry))
    }

    /// Export a case and wrap the result in its external shape.
    pub async fn export_artifact(
        &self,
        case_id: &CaseId,
        format: ExportFormat,
    ) -> Result<ExportArtifact> {
        let (bundle, entry) = self.export_as(case_id, format).await?;
        Ok(ExportArtifact::new(&bundle, &entry))
    }

    async fn assemble(&self, case_id: &CaseId, format: ExportFormat) -> Result<ExportBundle> {
        let case = self
            .cases
            .get_case(case_id)
            .await
            .map_err(EngineError::CaseStore)?
            .ok_or_else(|| EngineError::CaseNotFound(case_id.clone()))?;
        let entities = self
            .cases
            .list_entities(case_id)
            .await
            .map_err(EngineError::CaseStore)?;
        let evidence = self
            .cases
            .list_evidence(case_id)
            .await
            .map_err(EngineError::CaseStore)?;

        Ok(ExportBundle {
            case,
            entities,
            evidence,
            exported_at: Timestamp::now(),
            format,
        })
    }

    /// Link a checksum to the current head and append it.
    ///
    /// A lost race re-reads the head and re-signs; the checksum is reused.
    async fn append_linked(
        &self,
        case_id: &CaseId,
        checksum: Digest,
        key: &SigningKey,
    ) -> Result<ChainEntry> {
        let attempts = self.config.max_append_attempts.max(1);

        for attempt in 1..=attempts {
            let head = self.chain.head(case_id).await?;
            let link = ChainLink::after(head.as_ref());
            tracing::debug!(
                case_id = %case_id,
                sequence = link.sequence,
                attempt,
                "appending export"
            );

            let candidate = ChainEntry::signed(case_id.clone(), link, checksum, key);
            match self.chain.append(&candidate).await {
                Ok(entry) => return Ok(entry),
                Err(e) if e.is_concurrent_modification() => {
                    tracing::warn!(
                        case_id = %case_id,
                        attempt,
                        attempts,
                        "chain head moved during export, retrying"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::AppendRetriesExhausted {
            case_id: case_id.clone(),
            attempts,
        })
    }

    fn case_lock(&self, case_id: &CaseId) -> CaseLock {
        let mut locks = self.case_locks.lock().unwrap_or_else(|e| e.into_inner());
        // Drop queues nobody is waiting on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(case_id.clone()).or_default().clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a bundle against the linkage it claims at `sequence`.
    ///
    /// Fails only when the chain position cannot be found; every integrity
    /// outcome is reported in the result.
    pub async fn verify(
        &self,
        bundle: &ExportBundle,
        claimed: &ClaimedLinkage,
        case_id: &CaseId,
        sequence: u64,
    ) -> Result<VerificationResult> {
        let recomputed = match encode(bundle) {
            Ok(bytes) => Some(Digest::of(&bytes)),
            Err(e) => {
                tracing::warn!(case_id = %case_id, error = %e, "bundle cannot be encoded");
                None
            }
        };
        let matches = recomputed == Some(claimed.checksum);

        // One read, so linkage and the entry under test come from the same
        // snapshot.
        let entries = self.chain.range(case_id, 0, sequence).await?;
        if entries.is_empty() {
            return Err(EngineError::CaseNotFound(case_id.clone()));
        }
        let stored = entries
            .iter()
            .find(|e| e.sequence == sequence)
            .ok_or_else(|| EngineError::SequenceNotFound {
                case_id: case_id.clone(),
                sequence: Some(sequence),
            })?;

        let key = self.signing_key(case_id).await?;
        let signature_match = signing::verify(
            case_id,
            sequence,
            &claimed.checksum,
            claimed.prev_checksum.as_ref(),
            &claimed.signature,
            &key,
        );
        let ledger_match = claimed.matches_entry(stored);

        let health = check_links(case_id, &entries);
        if let ChainHealth::Broken { at_sequence, fault } = &health {
            tracing::warn!(
                case_id = %case_id,
                at_sequence,
                ?fault,
                "export chain is broken"
            );
        }

        let result = VerificationResult {
            case_id: case_id.clone(),
            sequence,
            checksum: recomputed,
            matches,
            signature_match,
            ledger_match,
            chain_valid: health.is_intact(),
        };

        if result.is_verified() {
            tracing::info!(case_id = %case_id, sequence, "export verified");
        } else {
            tracing::warn!(
                case_id = %case_id,
                sequence,
                matches,
                signature_match,
                ledger_match,
                chain_valid = result.chain_valid,
                "export failed verification"
            );
        }
        Ok(result)
    }

    /// Verify an export artifact as received from outside.
    pub async fn verify_artifact(&self, artifact: &ExportArtifact) -> Result<VerificationResult> {
        let claimed = artifact.claimed()?;
        let bundle = artifact.bundle();
        let case_id = bundle.case_id();
        let sequence = match artifact.sequence {
            Some(sequence) => sequence,
            None => self.locate(case_id, &claimed.checksum).await?,
        };
        self.verify(&bundle, &claimed, case_id, sequence).await
    }

    /// Find the chain position recorded for `checksum`.
    async fn locate(&self, case_id: &CaseId, checksum: &Digest) -> Result<u64> {
        let entries = self.chain.all(case_id).await?;
        if entries.is_empty() {
            return Err(EngineError::CaseNotFound(case_id.clone()));
        }
        entries
            .iter()
            .find(|e| e.checksum == *checksum)
            .map(|e| e.sequence)
            .ok_or_else(|| EngineError::SequenceNotFound {
                case_id: case_id.clone(),
                sequence: None,
            })
    }

    /// Verify an export artifact and report in the external shape.
    pub async fn verify_response(&self, artifact: &ExportArtifact) -> Result<VerificationResponse> {
        let claimed = artifact.claimed()?;
        let result = self.verify_artifact(artifact).await?;
        Ok(VerificationResponse::new(&result, &claimed))
    }

    /// Replay a case's entire chain: linkage and every stored signature.
    pub async fn audit(&self, case_id: &CaseId) -> Result<ChainAudit> {
        let entries = self.chain.all(case_id).await?;
        if entries.is_empty() {
            return Err(EngineError::CaseNotFound(case_id.clone()));
        }

        let key = self.signing_key(case_id).await?;
        let audit = audit_links(case_id, &entries, &key);

        if audit.is_valid() {
            tracing::info!(case_id = %case_id, length = audit.length, "chain audit passed");
        } else {
            tracing::warn!(
                case_id = %case_id,
                health = ?audit.health,
                invalid_signatures = ?audit.invalid_signatures,
                "chain audit failed"
            );
        }
        Ok(audit)
    }

    async fn signing_key(&self, case_id: &CaseId) -> Result<SigningKey> {
        self.secrets
            .signing_key(case_id)
            .await
            .map_err(EngineError::SecretProvider)
    }
}
