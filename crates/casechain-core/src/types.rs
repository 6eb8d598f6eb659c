//! Strong type definitions for case exports.
//!
//! Everything in this module is read-only input handed over by the case
//! store, plus the [`ExportBundle`] assembled from it.

use chrono::{DateTime, Datelike, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, EncodingError};

/// Identifier of an investigation case.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Create a case identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({})", self.0)
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CaseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CaseId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A UTC instant normalized to microsecond precision.
///
/// Renders as `YYYY-MM-DDTHH:MM:SS.ffffffZ`: always six fractional digits,
/// always the `Z` suffix. Inputs with other offsets are converted to UTC.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current time, truncated to microseconds.
    pub fn now() -> Self {
        Self::from_utc(Utc::now())
    }

    /// Wrap a `DateTime<Utc>`, discarding sub-microsecond precision.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        let micros_as_nanos = (dt.nanosecond() / 1_000) * 1_000;
        Self(dt.with_nanosecond(micros_as_nanos).unwrap_or(dt))
    }

    /// Build from microseconds since the Unix epoch.
    pub fn from_unix_micros(micros: i64) -> Result<Self, CoreError> {
        DateTime::from_timestamp_micros(micros)
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("out of range: {micros}us")))
    }

    /// Parse an RFC 3339 timestamp with any offset, normalizing to UTC.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|e| CoreError::InvalidTimestamp(format!("{s:?}: {e}")))?;
        Ok(Self::from_utc(dt.with_timezone(&Utc)))
    }

    pub fn unix_micros(&self) -> i64 {
        self.0.timestamp_micros()
    }

    /// Render in the fixed ISO-8601 form.
    pub fn to_iso8601(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    /// Render for canonical encoding.
    ///
    /// ISO-8601 without extensions only covers four-digit years, so anything
    /// outside `0000..=9999` is rejected.
    pub fn canonical_text(&self) -> Result<String, EncodingError> {
        let year = self.0.year();
        if !(0..=9999).contains(&year) {
            return Err(EncodingError::UnrepresentableTimestamp(format!(
                "year {year} outside 0000..=9999"
            )));
        }
        Ok(self.to_iso8601())
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.to_iso8601())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Active,
    Closed,
    Archived,
    Pending,
}

impl CaseStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Active => "active",
            CaseStatus::Closed => "closed",
            CaseStatus::Archived => "archived",
            CaseStatus::Pending => "pending",
        }
    }
}

impl FromStr for CaseStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CaseStatus::Active),
            "closed" => Ok(CaseStatus::Closed),
            "archived" => Ok(CaseStatus::Archived),
            "pending" => Ok(CaseStatus::Pending),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Case metadata as provided by the case store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: CaseId,
    pub title: String,
    pub description: String,
    pub lead_investigator: String,
    pub status: CaseStatus,
    pub created_at: Timestamp,
}

/// A scalar label value attached to an entity.
///
/// Label maps are open-ended on the producer side; here they are closed
/// to the variants canonical encoding knows how to normalize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for LabelValue {
    fn from(b: bool) -> Self {
        LabelValue::Bool(b)
    }
}

impl From<i64> for LabelValue {
    fn from(n: i64) -> Self {
        LabelValue::Integer(n)
    }
}

impl From<f64> for LabelValue {
    fn from(f: f64) -> Self {
        LabelValue::Float(f)
    }
}

impl From<&str> for LabelValue {
    fn from(s: &str) -> Self {
        LabelValue::Text(s.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(s: String) -> Self {
        LabelValue::Text(s)
    }
}

/// An address on a chain, with free-form labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub address: String,
    pub chain: String,
    #[serde(default)]
    pub labels: BTreeMap<String, LabelValue>,
}

impl Entity {
    pub fn new(address: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            chain: chain.into(),
            labels: BTreeMap::new(),
        }
    }

    /// Add a label (builder style).
    pub fn label(mut self, key: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Links a case to an external resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub resource_id: String,
    pub resource_type: String,
    /// Content hash of the resource, as supplied by the case store.
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub notes: String,
    pub linked_at: Timestamp,
}

/// Output format recorded in the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(CoreError::InvalidFormat(other.to_string())),
        }
    }
}

/// The unit that is encoded, hashed and chained.
///
/// Built fresh for each export and never modified once its checksum
/// has been computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub case: Case,
    pub entities: Vec<Entity>,
    pub evidence: Vec<EvidenceLink>,
    pub exported_at: Timestamp,
    pub format: ExportFormat,
}

impl ExportBundle {
    pub fn case_id(&self) -> &CaseId {
        &self.case.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_truncates_to_micros() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.to_iso8601(), "2025-03-01T12:00:00.123456Z");
    }

    #[test]
    fn test_timestamp_fixed_precision() {
        let ts = Timestamp::from_utc(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(ts.to_iso8601(), "2025-03-01T12:00:00.000000Z");
    }

    #[test]
    fn test_timestamp_offset_normalized() {
        let a = Timestamp::parse("2025-03-01T14:00:00+02:00").unwrap();
        let b = Timestamp::parse("2025-03-01T12:00:00Z").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_iso8601(), "2025-03-01T12:00:00.000000Z");
    }

    #[test]
    fn test_timestamp_out_of_iso_range() {
        let dt = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        let ts = Timestamp::from_utc(dt);
        assert!(matches!(
            ts.canonical_text(),
            Err(EncodingError::UnrepresentableTimestamp(_))
        ));
    }

    #[test]
    fn test_timestamp_serde_roundtrip() {
        let ts = Timestamp::from_unix_micros(1_736_870_400_123_456).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2025-01-14T16:00:00.123456Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }

    #[test]
    fn test_case_status_parse() {
        assert_eq!("archived".parse::<CaseStatus>().unwrap(), CaseStatus::Archived);
        assert!("deleted".parse::<CaseStatus>().is_err());
    }

    #[test]
    fn test_label_value_untagged_json() {
        let entity: Entity = serde_json::from_str(
            r#"{"address":"0xabc","chain":"eth","labels":{"risk":0.75,"hops":3,"tag":"mixer","flag":true,"none":null}}"#,
        )
        .unwrap();
        assert_eq!(entity.labels["risk"], LabelValue::Float(0.75));
        assert_eq!(entity.labels["hops"], LabelValue::Integer(3));
        assert_eq!(entity.labels["tag"], LabelValue::Text("mixer".into()));
        assert_eq!(entity.labels["flag"], LabelValue::Bool(true));
        assert_eq!(entity.labels["none"], LabelValue::Null);
    }
}
