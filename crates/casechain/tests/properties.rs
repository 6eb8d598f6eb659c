//! Property tests: tamper and signature detection through the engine.

use casechain::core::{checksum, encode, sign, verify, CaseId, Digest, SigningKey};
use casechain_testkit::generators::{bundle_and_mutation, case_id};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_any_mutation_breaks_match((original, changed) in bundle_and_mutation()) {
        let claimed = Digest::of(&encode(&original).unwrap());
        let recomputed = Digest::of(&encode(&changed).unwrap());
        prop_assert_ne!(claimed, recomputed);
    }

    #[test]
    fn test_signature_binds_key_and_position(
        id in case_id(),
        seq in 0u64..1_000_000,
        data in prop::collection::vec(any::<u8>(), 0..64),
        key_a in any::<[u8; 32]>(),
        key_b in any::<[u8; 32]>(),
    ) {
        prop_assume!(key_a != key_b);
        let key_a = SigningKey::new(key_a.to_vec()).unwrap();
        let key_b = SigningKey::new(key_b.to_vec()).unwrap();
        let c = checksum(&data);
        let prev = (seq > 0).then(|| checksum(&seq.to_be_bytes()));

        let mac = sign(&id, seq, &c, prev.as_ref(), &key_a);
        prop_assert!(verify(&id, seq, &c, prev.as_ref(), &mac, &key_a));
        prop_assert!(!verify(&id, seq, &c, prev.as_ref(), &mac, &key_b));
        prop_assert!(!verify(&id, seq + 1, &c, prev.as_ref(), &mac, &key_a));

        let other_case = CaseId::new(format!("{}x", id));
        prop_assert!(!verify(&other_case, seq, &c, prev.as_ref(), &mac, &key_a));
    }
}
