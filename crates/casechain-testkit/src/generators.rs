//! Proptest generators for property-based testing.

use proptest::prelude::*;

use casechain_core::{
    Case, CaseId, CaseStatus, Entity, EvidenceLink, ExportBundle, ExportFormat, LabelValue,
    Timestamp,
};

/// Microseconds at 9999-12-31T23:59:59.999999Z.
const MAX_MICROS: i64 = 253_402_300_799_999_999;

/// A timestamp with a four-digit year at or after the Unix epoch.
pub fn timestamp() -> impl Strategy<Value = Timestamp> {
    (0i64..=MAX_MICROS).prop_map(|micros| {
        Timestamp::from_unix_micros(micros).expect("micros within chrono's range")
    })
}

pub fn case_id() -> impl Strategy<Value = CaseId> {
    "[A-Z]{1,4}-[0-9]{1,6}".prop_map(CaseId::new)
}

pub fn case_status() -> impl Strategy<Value = CaseStatus> {
    prop_oneof![
        Just(CaseStatus::Active),
        Just(CaseStatus::Closed),
        Just(CaseStatus::Archived),
        Just(CaseStatus::Pending),
    ]
}

pub fn export_format() -> impl Strategy<Value = ExportFormat> {
    prop_oneof![Just(ExportFormat::Json), Just(ExportFormat::Csv)]
}

/// A label value that canonical encoding accepts (floats are finite).
pub fn label_value() -> impl Strategy<Value = LabelValue> {
    prop_oneof![
        Just(LabelValue::Null),
        any::<bool>().prop_map(LabelValue::Bool),
        any::<i64>().prop_map(LabelValue::Integer),
        prop::num::f64::NORMAL.prop_map(LabelValue::Float),
        ".{0,24}".prop_map(LabelValue::Text),
    ]
}

pub fn case() -> impl Strategy<Value = Case> {
    (
        case_id(),
        ".{0,40}",
        ".{0,80}",
        "[a-z]\\.[a-z]{2,10}",
        case_status(),
        timestamp(),
    )
        .prop_map(
            |(id, title, description, lead_investigator, status, created_at)| Case {
                id,
                title,
                description,
                lead_investigator,
                status,
                created_at,
            },
        )
}

pub fn entity() -> impl Strategy<Value = Entity> {
    (
        "0x[0-9a-f]{8,40}",
        prop_oneof![Just("ethereum"), Just("bitcoin"), Just("tron"), Just("solana")],
        prop::collection::btree_map("[a-z_]{1,12}", label_value(), 0..5),
    )
        .prop_map(|(address, chain, labels)| Entity {
            address,
            chain: chain.to_string(),
            labels,
        })
}

pub fn evidence_link() -> impl Strategy<Value = EvidenceLink> {
    (
        "[a-z]{2,6}-[0-9]{1,5}",
        prop_oneof![Just("transaction"), Just("document"), Just("screenshot")],
        proptest::option::of("[0-9a-f]{64}"),
        ".{0,40}",
        timestamp(),
    )
        .prop_map(
            |(resource_id, resource_type, content_hash, notes, linked_at)| EvidenceLink {
                resource_id,
                resource_type: resource_type.to_string(),
                content_hash,
                notes,
                linked_at,
            },
        )
}

/// A bundle that always encodes.
pub fn bundle() -> impl Strategy<Value = ExportBundle> {
    (
        case(),
        prop::collection::vec(entity(), 0..6),
        prop::collection::vec(evidence_link(), 0..6),
        timestamp(),
        export_format(),
    )
        .prop_map(|(case, entities, evidence, exported_at, format)| ExportBundle {
            case,
            entities,
            evidence,
            exported_at,
            format,
        })
}

/// A bundle paired with a copy that differs in exactly one observable field.
pub fn bundle_and_mutation() -> impl Strategy<Value = (ExportBundle, ExportBundle)> {
    (bundle(), 0u8..5).prop_map(|(original, which)| {
        let mut changed = original.clone();
        match which {
            0 => changed.case.title.push('!'),
            1 => changed.case.description.push_str(" (amended)"),
            2 => changed.entities.push(Entity::new("0xadded", "ethereum")),
            3 => {
                changed.format = match original.format {
                    ExportFormat::Json => ExportFormat::Csv,
                    ExportFormat::Csv => ExportFormat::Json,
                }
            }
            _ => changed.case.lead_investigator.push('x'),
        }
        (original, changed)
    })
}
