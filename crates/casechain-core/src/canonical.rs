//! Canonical CBOR encoding for export bundles.
//!
//! Bundles are encoded as CBOR (RFC 8949) with deterministic rules:
//! - Map keys: text, sorted lexicographically by their UTF-8 bytes
//! - Integers: smallest valid encoding
//! - Lengths: definite only
//! - Floats: never encoded as CBOR floats; label floats become a tagged text
//!   string holding their shortest round-trip decimal form
//! - Timestamps: UTC text, `YYYY-MM-DDTHH:MM:SS.ffffffZ`
//! - Entities and evidence: sorted by their own encoded bytes
//!
//! **CRITICAL**: This encoding is FROZEN. Changing it breaks every checksum
//! already recorded in a chain.

use ciborium::value::{Integer, Value};

use crate::error::EncodingError;
use crate::types::{Case, Entity, EvidenceLink, ExportBundle, LabelValue};

/// Version of the bundle encoding, stored under key `v`.
pub const ENCODING_VERSION: u64 = 1;

/// CBOR tag marking a float rendered as decimal text.
pub const FLOAT_TEXT_TAG: u64 = 5001;

/// Bundle map key names.
mod keys {
    pub const VERSION: &str = "v";
    pub const CASE: &str = "case";
    pub const ENTITIES: &str = "entities";
    pub const EVIDENCE: &str = "evidence";
    pub const EXPORTED_AT: &str = "exported_at";
    pub const FORMAT: &str = "format";

    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const LEAD_INVESTIGATOR: &str = "lead_investigator";
    pub const STATUS: &str = "status";
    pub const CREATED_AT: &str = "created_at";

    pub const ADDRESS: &str = "address";
    pub const CHAIN: &str = "chain";
    pub const LABELS: &str = "labels";

    pub const RESOURCE_ID: &str = "resource_id";
    pub const RESOURCE_TYPE: &str = "resource_type";
    pub const CONTENT_HASH: &str = "content_hash";
    pub const NOTES: &str = "notes";
    pub const LINKED_AT: &str = "linked_at";
}

/// Bytes produced by canonical encoding.
///
/// The only constructor is [`encode`], so anything hashed as a bundle
/// checksum has been through the normalization rules above.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Encode an export bundle to canonical bytes.
///
/// Two bundles with the same logical content always produce identical
/// bytes, regardless of label insertion order or the order in which the
/// case store listed entities and evidence.
pub fn encode(bundle: &ExportBundle) -> Result<CanonicalBytes, EncodingError> {
    let value = bundle_to_value(bundle)?;
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value)?;
    Ok(CanonicalBytes(buf))
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn entry(key: &str, value: Value) -> (Value, Value) {
    (text(key), value)
}

fn bundle_to_value(bundle: &ExportBundle) -> Result<Value, EncodingError> {
    let entities = bundle
        .entities
        .iter()
        .map(entity_to_value)
        .collect::<Result<Vec<_>, _>>()?;

    let evidence = bundle
        .evidence
        .iter()
        .map(evidence_to_value)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Value::Map(vec![
        entry(keys::VERSION, Value::Integer(ENCODING_VERSION.into())),
        entry(keys::CASE, case_to_value(&bundle.case)?),
        entry(keys::ENTITIES, sorted_array(entities)?),
        entry(keys::EVIDENCE, sorted_array(evidence)?),
        entry(keys::EXPORTED_AT, text(&bundle.exported_at.canonical_text()?)),
        entry(keys::FORMAT, text(bundle.format.as_str())),
    ]))
}

fn case_to_value(case: &Case) -> Result<Value, EncodingError> {
    if case.id.is_empty() {
        return Err(EncodingError::EmptyCaseId);
    }

    Ok(Value::Map(vec![
        entry(keys::ID, text(case.id.as_str())),
        entry(keys::TITLE, text(&case.title)),
        entry(keys::DESCRIPTION, text(&case.description)),
        entry(keys::LEAD_INVESTIGATOR, text(&case.lead_investigator)),
        entry(keys::STATUS, text(case.status.as_str())),
        entry(keys::CREATED_AT, text(&case.created_at.canonical_text()?)),
    ]))
}

fn entity_to_value(entity: &Entity) -> Result<Value, EncodingError> {
    let labels = entity
        .labels
        .iter()
        .map(|(k, v)| Ok((text(k), label_to_value(k, v)?)))
        .collect::<Result<Vec<_>, EncodingError>>()?;

    Ok(Value::Map(vec![
        entry(keys::ADDRESS, text(&entity.address)),
        entry(keys::CHAIN, text(&entity.chain)),
        entry(keys::LABELS, Value::Map(labels)),
    ]))
}

fn evidence_to_value(link: &EvidenceLink) -> Result<Value, EncodingError> {
    let content_hash = match &link.content_hash {
        Some(h) => text(h),
        None => Value::Null,
    };

    Ok(Value::Map(vec![
        entry(keys::RESOURCE_ID, text(&link.resource_id)),
        entry(keys::RESOURCE_TYPE, text(&link.resource_type)),
        entry(keys::CONTENT_HASH, content_hash),
        entry(keys::NOTES, text(&link.notes)),
        entry(keys::LINKED_AT, text(&link.linked_at.canonical_text()?)),
    ]))
}

fn label_to_value(key: &str, value: &LabelValue) -> Result<Value, EncodingError> {
    Ok(match value {
        LabelValue::Null => Value::Null,
        LabelValue::Bool(b) => Value::Bool(*b),
        LabelValue::Integer(n) => Value::Integer((*n).into()),
        LabelValue::Float(f) => float_value(*f).ok_or_else(|| EncodingError::NonFiniteNumber {
            key: key.to_string(),
            value: *f,
        })?,
        LabelValue::Text(s) => text(s),
    })
}

/// Render a float as tagged decimal text, or `None` if it is not finite.
fn float_value(f: f64) -> Option<Value> {
    if !f.is_finite() {
        return None;
    }
    // -0.0 and 0.0 are the same label value
    let f = if f == 0.0 { 0.0 } else { f };
    Some(Value::Tag(FLOAT_TEXT_TAG, Box::new(Value::Text(format!("{f}")))))
}

/// Build an array whose elements are ordered by their canonical bytes.
fn sorted_array(items: Vec<Value>) -> Result<Value, EncodingError> {
    let mut keyed = items
        .into_iter()
        .map(|item| {
            let mut bytes = Vec::new();
            encode_value_to(&mut bytes, &item)?;
            Ok((bytes, item))
        })
        .collect::<Result<Vec<_>, EncodingError>>()?;

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(Value::Array(keyed.into_iter().map(|(_, v)| v).collect()))
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), EncodingError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Tag(tag, inner) => {
            encode_uint(buf, 6, *tag);
            encode_value_to(buf, inner)?;
        }
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => return Err(EncodingError::UnsupportedValue("unknown CBOR value type")),
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<(), EncodingError> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Text keys sort by their raw UTF-8 bytes; any other key sorts by its
/// encoded form.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), EncodingError> {
    let mut pairs = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k)?;
            let sort_key = match k {
                Value::Text(s) => s.as_bytes().to_vec(),
                _ => key_buf.clone(),
            };
            Ok((sort_key, key_buf, v))
        })
        .collect::<Result<Vec<_>, EncodingError>>()?;

    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (_, key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
