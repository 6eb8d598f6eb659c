//! Interfaces to the systems the engine reads from.
//!
//! Case data and signing keys are owned elsewhere. Their failures are
//! infrastructure errors, so both traits report them as `anyhow::Error`.

use async_trait::async_trait;
use casechain_core::{Case, CaseId, Entity, EvidenceLink, SigningKey};

/// Read-only access to cases and what is linked to them.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// The case, or `None` if it does not exist.
    async fn get_case(&self, case_id: &CaseId) -> anyhow::Result<Option<Case>>;

    /// Entities linked to the case, in any order.
    async fn list_entities(&self, case_id: &CaseId) -> anyhow::Result<Vec<Entity>>;

    /// Evidence linked to the case, in any order.
    async fn list_evidence(&self, case_id: &CaseId) -> anyhow::Result<Vec<EvidenceLink>>;
}

/// Source of signing keys.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// The key that signs and verifies the given case's chain.
    async fn signing_key(&self, case_id: &CaseId) -> anyhow::Result<SigningKey>;
}
