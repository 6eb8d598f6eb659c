//! Test fixtures and helpers.
//!
//! Collaborator stand-ins, fault-injecting chain stores, and a fixture that
//! wires them into an [`Engine`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use casechain::{CaseStore, Engine, EngineConfig, SecretProvider};
use casechain_core::{
    Case, CaseId, CaseStatus, ChainEntry, Entity, EvidenceLink, SigningKey, Timestamp,
};
use casechain_store::{ChainStore, StoreError};

/// Case seeded into every [`TestFixture`].
pub const SAMPLE_CASE: &str = "C1";

/// Key used by [`TestFixture`] unless overridden.
pub const SAMPLE_KEY: &[u8] = b"casechain-fixture-key";

fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap_or_else(|e| panic!("fixture timestamp {s:?}: {e}"))
}

pub fn sample_case(id: &str) -> Case {
    Case {
        id: CaseId::new(id),
        title: "Exchange hot wallet drain".into(),
        description: "Stolen funds traced through a mixer into two bridges".into(),
        lead_investigator: "r.okafor".into(),
        status: CaseStatus::Active,
        created_at: ts("2025-03-10T08:15:00Z"),
    }
}

pub fn sample_entities() -> Vec<Entity> {
    vec![
        Entity::new("0x7f3a9c1e", "ethereum")
            .label("cluster", 42i64)
            .label("risk_score", 0.93)
            .label("sanctioned", false),
        Entity::new("bc1q9h7garj", "bitcoin").label("role", "consolidation"),
        Entity::new("TQn9Y2khDD", "tron"),
    ]
}

pub fn sample_evidence() -> Vec<EvidenceLink> {
    vec![
        EvidenceLink {
            resource_id: "tx-0001".into(),
            resource_type: "transaction".into(),
            content_hash: Some("9f86d081884c7d65".into()),
            notes: "initial drain".into(),
            linked_at: ts("2025-03-10T09:00:00.250000Z"),
        },
        EvidenceLink {
            resource_id: "report-17".into(),
            resource_type: "document".into(),
            content_hash: None,
            notes: String::new(),
            linked_at: ts("2025-03-11T14:30:00Z"),
        },
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct CaseRecord {
    case: Case,
    entities: Vec<Entity>,
    evidence: Vec<EvidenceLink>,
}

/// Case store backed by a map.
#[derive(Default)]
pub struct InMemoryCaseStore {
    records: RwLock<HashMap<CaseId, CaseRecord>>,
    reverse_listing: bool,
}

impl InMemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// List entities and evidence in reverse insertion order.
    pub fn with_reversed_listing(mut self) -> Self {
        self.reverse_listing = true;
        self
    }

    pub fn insert_case(&self, case: Case) {
        let mut records = self.records.write().unwrap();
        records.insert(
            case.id.clone(),
            CaseRecord {
                case,
                entities: Vec::new(),
                evidence: Vec::new(),
            },
        );
    }

    /// Insert a case with the sample entities and evidence.
    pub fn insert_sample(&self, id: &str) {
        self.insert_case(sample_case(id));
        let case_id = CaseId::new(id);
        for entity in sample_entities() {
            self.add_entity(&case_id, entity);
        }
        for link in sample_evidence() {
            self.add_evidence(&case_id, link);
        }
    }

    pub fn add_entity(&self, case_id: &CaseId, entity: Entity) {
        self.modify(case_id, |r| r.entities.push(entity));
    }

    pub fn add_evidence(&self, case_id: &CaseId, link: EvidenceLink) {
        self.modify(case_id, |r| r.evidence.push(link));
    }

    pub fn set_title(&self, case_id: &CaseId, title: &str) {
        self.modify(case_id, |r| r.case.title = title.to_string());
    }

    fn modify(&self, case_id: &CaseId, f: impl FnOnce(&mut CaseRecord)) {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(case_id)
            .unwrap_or_else(|| panic!("no case {case_id} in fixture store"));
        f(record);
    }

    fn listed<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let mut items = items.to_vec();
        if self.reverse_listing {
            items.reverse();
        }
        items
    }
}

#[async_trait]
impl CaseStore for InMemoryCaseStore {
    async fn get_case(&self, case_id: &CaseId) -> anyhow::Result<Option<Case>> {
        let records = self.records.read().unwrap();
        Ok(records.get(case_id).map(|r| r.case.clone()))
    }

    async fn list_entities(&self, case_id: &CaseId) -> anyhow::Result<Vec<Entity>> {
        let records = self.records.read().unwrap();
        Ok(records
            .get(case_id)
            .map(|r| self.listed(&r.entities))
            .unwrap_or_default())
    }

    async fn list_evidence(&self, case_id: &CaseId) -> anyhow::Result<Vec<EvidenceLink>> {
        let records = self.records.read().unwrap();
        Ok(records
            .get(case_id)
            .map(|r| self.listed(&r.evidence))
            .unwrap_or_default())
    }
}

/// Secret provider with one key for every case.
pub struct StaticSecretProvider {
    key: SigningKey,
}

impl StaticSecretProvider {
    pub fn new(key: &[u8]) -> Self {
        Self {
            key: SigningKey::new(key.to_vec()).unwrap(),
        }
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }
}

#[async_trait]
impl SecretProvider for StaticSecretProvider {
    async fn signing_key(&self, _case_id: &CaseId) -> anyhow::Result<SigningKey> {
        Ok(self.key.clone())
    }
}

/// Case store whose backend is unreachable.
pub struct UnavailableCaseStore;

fn unreachable_backend(what: &str) -> anyhow::Error {
    std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        format!("{what} unreachable"),
    )
    .into()
}

#[async_trait]
impl CaseStore for UnavailableCaseStore {
    async fn get_case(&self, _case_id: &CaseId) -> anyhow::Result<Option<Case>> {
        Err(unreachable_backend("case database"))
    }

    async fn list_entities(&self, _case_id: &CaseId) -> anyhow::Result<Vec<Entity>> {
        Err(unreachable_backend("case database"))
    }

    async fn list_evidence(&self, _case_id: &CaseId) -> anyhow::Result<Vec<EvidenceLink>> {
        Err(unreachable_backend("case database"))
    }
}

/// Secret provider whose vault is unreachable.
pub struct UnavailableSecretProvider;

#[async_trait]
impl SecretProvider for UnavailableSecretProvider {
    async fn signing_key(&self, _case_id: &CaseId) -> anyhow::Result<SigningKey> {
        Err(unreachable_backend("key vault"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fault-injecting stores
// ─────────────────────────────────────────────────────────────────────────────

/// Chain store whose reads can be made to return altered entries.
///
/// Stands in for someone editing the ledger behind the engine's back. The
/// underlying store is left untouched.
pub struct TamperingChainStore<S> {
    inner: S,
    overrides: RwLock<HashMap<(CaseId, u64), ChainEntry>>,
}

impl<S: ChainStore> TamperingChainStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overrides: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Alter the stored entry at `sequence` as seen by every later read.
    ///
    /// Panics if there is no such entry.
    pub async fn tamper(&self, case_id: &CaseId, sequence: u64, f: impl FnOnce(&mut ChainEntry)) {
        let mut entry = self
            .inner
            .entry_at(case_id, sequence)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no entry {sequence} for case {case_id}"));
        f(&mut entry);
        self.overrides
            .write()
            .unwrap()
            .insert((case_id.clone(), sequence), entry);
    }

    fn apply(&self, entry: ChainEntry) -> ChainEntry {
        let overrides = self.overrides.read().unwrap();
        overrides
            .get(&(entry.case_id.clone(), entry.sequence))
            .cloned()
            .unwrap_or(entry)
    }
}

#[async_trait]
impl<S: ChainStore> ChainStore for TamperingChainStore<S> {
    async fn head(&self, case_id: &CaseId) -> casechain_store::Result<Option<ChainEntry>> {
        Ok(self.inner.head(case_id).await?.map(|e| self.apply(e)))
    }

    async fn entry_at(
        &self,
        case_id: &CaseId,
        sequence: u64,
    ) -> casechain_store::Result<Option<ChainEntry>> {
        Ok(self
            .inner
            .entry_at(case_id, sequence)
            .await?
            .map(|e| self.apply(e)))
    }

    async fn range(
        &self,
        case_id: &CaseId,
        start: u64,
        end: u64,
    ) -> casechain_store::Result<Vec<ChainEntry>> {
        let entries = self.inner.range(case_id, start, end).await?;
        Ok(entries.into_iter().map(|e| self.apply(e)).collect())
    }

    async fn all(&self, case_id: &CaseId) -> casechain_store::Result<Vec<ChainEntry>> {
        let entries = self.inner.all(case_id).await?;
        Ok(entries.into_iter().map(|e| self.apply(e)).collect())
    }

    async fn list_cases(&self) -> casechain_store::Result<Vec<CaseId>> {
        self.inner.list_cases().await
    }

    async fn append(&self, entry: &ChainEntry) -> casechain_store::Result<ChainEntry> {
        self.inner.append(entry).await
    }
}

/// Chain store that loses a set number of append races before letting
/// appends through.
pub struct ConflictingChainStore<S> {
    inner: S,
    conflicts_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl<S: ChainStore> ConflictingChainStore<S> {
    /// Reject the next `conflicts` appends.
    pub fn new(inner: S, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_remaining: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
        }
    }

    /// Reject every append.
    pub fn always(inner: S) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// Appends attempted so far, rejected or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ChainStore> ChainStore for ConflictingChainStore<S> {
    async fn head(&self, case_id: &CaseId) -> casechain_store::Result<Option<ChainEntry>> {
        self.inner.head(case_id).await
    }

    async fn entry_at(
        &self,
        case_id: &CaseId,
        sequence: u64,
    ) -> casechain_store::Result<Option<ChainEntry>> {
        self.inner.entry_at(case_id, sequence).await
    }

    async fn range(
        &self,
        case_id: &CaseId,
        start: u64,
        end: u64,
    ) -> casechain_store::Result<Vec<ChainEntry>> {
        self.inner.range(case_id, start, end).await
    }

    async fn all(&self, case_id: &CaseId) -> casechain_store::Result<Vec<ChainEntry>> {
        self.inner.all(case_id).await
    }

    async fn list_cases(&self) -> casechain_store::Result<Vec<CaseId>> {
        self.inner.list_cases().await
    }

    async fn append(&self, entry: &ChainEntry) -> casechain_store::Result<ChainEntry> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let lost = self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return Err(StoreError::ConcurrentModification {
                case_id: entry.case_id.clone(),
                attempted: entry.sequence,
                head: entry.sequence.checked_sub(1),
            });
        }

        self.inner.append(entry).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine fixture
// ─────────────────────────────────────────────────────────────────────────────

/// A case store seeded with [`SAMPLE_CASE`] and a static signing key.
pub struct TestFixture {
    pub cases: Arc<InMemoryCaseStore>,
    pub secrets: Arc<StaticSecretProvider>,
}

impl TestFixture {
    pub fn new() -> Self {
        Self::with_case_store(InMemoryCaseStore::new())
    }

    /// Seed the sample case into a caller-configured case store.
    pub fn with_case_store(cases: InMemoryCaseStore) -> Self {
        cases.insert_sample(SAMPLE_CASE);
        Self {
            cases: Arc::new(cases),
            secrets: Arc::new(StaticSecretProvider::new(SAMPLE_KEY)),
        }
    }

    pub fn case_id(&self) -> CaseId {
        CaseId::new(SAMPLE_CASE)
    }

    pub fn key(&self) -> &SigningKey {
        self.secrets.key()
    }

    pub fn engine<S: ChainStore>(&self, store: S) -> Engine<S> {
        self.engine_with_config(store, EngineConfig::default())
    }

    pub fn engine_with_config<S: ChainStore>(&self, store: S, config: EngineConfig) -> Engine<S> {
        Engine::new(store, self.cases.clone(), self.secrets.clone(), config)
    }

    /// Same case data, secrets from `secrets`.
    pub fn engine_with_secrets<S: ChainStore>(
        &self,
        store: S,
        secrets: Arc<dyn SecretProvider>,
    ) -> Engine<S> {
        Engine::new(store, self.cases.clone(), secrets, EngineConfig::default())
    }

    /// Same case data, different key.
    pub fn engine_with_key<S: ChainStore>(&self, store: S, key: &[u8]) -> Engine<S> {
        Engine::new(
            store,
            self.cases.clone(),
            Arc::new(StaticSecretProvider::new(key)),
            EngineConfig::default(),
        )
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casechain_core::{checksum, ChainLink};
    use casechain_store::MemoryChainStore;

    #[tokio::test]
    async fn test_fixture_case_store() {
        let fixture = TestFixture::new();
        let case_id = fixture.case_id();

        let case = fixture.cases.get_case(&case_id).await.unwrap().unwrap();
        assert_eq!(case.id, case_id);
        assert_eq!(fixture.cases.list_entities(&case_id).await.unwrap().len(), 3);
        assert!(fixture
            .cases
            .get_case(&CaseId::new("C404"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reversed_listing() {
        let forward = InMemoryCaseStore::new();
        forward.insert_sample("C1");
        let reversed = InMemoryCaseStore::new().with_reversed_listing();
        reversed.insert_sample("C1");

        let case_id = CaseId::new("C1");
        let mut a = forward.list_evidence(&case_id).await.unwrap();
        let b = reversed.list_evidence(&case_id).await.unwrap();
        assert_ne!(a, b);
        a.reverse();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_tampering_store_overrides_reads() {
        let store = TamperingChainStore::new(MemoryChainStore::new());
        let case_id = CaseId::new("C1");
        let key = SigningKey::new(b"k".to_vec()).unwrap();
        let entry = ChainEntry::signed(case_id.clone(), ChainLink::GENESIS, checksum(b"a"), &key);
        store.append(&entry).await.unwrap();

        store
            .tamper(&case_id, 0, |e| e.checksum = checksum(b"forged"))
            .await;

        let seen = store.entry_at(&case_id, 0).await.unwrap().unwrap();
        assert_eq!(seen.checksum, checksum(b"forged"));
        assert_eq!(
            store.inner().entry_at(&case_id, 0).await.unwrap(),
            Some(entry)
        );
    }

    #[tokio::test]
    async fn test_conflicting_store_counts_attempts() {
        let store = ConflictingChainStore::new(MemoryChainStore::new(), 2);
        let key = SigningKey::new(b"k".to_vec()).unwrap();
        let entry = ChainEntry::signed(CaseId::new("C1"), ChainLink::GENESIS, checksum(b"a"), &key);

        assert!(store.append(&entry).await.unwrap_err().is_concurrent_modification());
        assert!(store.append(&entry).await.unwrap_err().is_concurrent_modification());
        assert!(store.append(&entry).await.is_ok());
        assert_eq!(store.attempts(), 3);
    }
}
