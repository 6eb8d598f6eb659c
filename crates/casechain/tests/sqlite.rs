//! Export chains persisted in SQLite.

use casechain::store::{ChainStore, SqliteChainStore};
use casechain::{ClaimedLinkage, ExportArtifact};
use casechain_testkit::TestFixture;

#[tokio::test]
async fn test_chain_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exports.db");
    let fixture = TestFixture::new();
    let case_id = fixture.case_id();

    let artifact = {
        let engine = fixture.engine(SqliteChainStore::open(&path).unwrap());
        engine.export(&case_id).await.unwrap();
        let (bundle, entry) = engine.export(&case_id).await.unwrap();
        ExportArtifact::new(&bundle, &entry)
    };

    let engine = fixture.engine(SqliteChainStore::open(&path).unwrap());
    let result = engine.verify_artifact(&artifact).await.unwrap();
    assert!(result.is_verified());

    let (_, third) = engine.export(&case_id).await.unwrap();
    assert_eq!(third.sequence, 2);
    assert_eq!(
        third.prev_checksum.map(|d| d.to_hex()),
        Some(artifact.checksum_sha256.clone())
    );

    let audit = engine.audit(&case_id).await.unwrap();
    assert!(audit.is_valid());
    assert_eq!(audit.length, 3);
}

#[tokio::test]
async fn test_sqlite_verify_matches_memory_semantics() {
    let fixture = TestFixture::new();
    let engine = fixture.engine(SqliteChainStore::open_memory().unwrap());
    let case_id = fixture.case_id();

    let (bundle, entry) = engine.export(&case_id).await.unwrap();
    let stored = engine.store().entry_at(&case_id, 0).await.unwrap().unwrap();
    assert_eq!(stored, entry);

    let mut altered = bundle.clone();
    altered.entities.clear();
    let result = engine
        .verify(&altered, &ClaimedLinkage::from(&entry), &case_id, 0)
        .await
        .unwrap();
    assert!(!result.matches);
    assert!(result.ledger_match);
}
