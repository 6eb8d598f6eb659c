//! Engine configuration.

use casechain_core::ExportFormat;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Configuration for the [`Engine`](crate::Engine).
///
/// Every field has a default, so a host may supply any subset as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attempts at appending an export before giving up on a contended head.
    pub max_append_attempts: u32,
    /// Format used by [`Engine::export`](crate::Engine::export).
    pub default_format: ExportFormat,
    /// Queue exports of the same case behind one another in this process.
    pub serialize_exports: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_append_attempts: 5,
            default_format: ExportFormat::Json,
            serialize_exports: true,
        }
    }
}

impl EngineConfig {
    /// Parse from JSON, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_append_attempts, 5);
        assert_eq!(config.default_format, ExportFormat::Json);
        assert!(config.serialize_exports);
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"default_format": "csv"}"#).unwrap();
        assert_eq!(config.default_format, ExportFormat::Csv);
        assert_eq!(config.max_append_attempts, 5);

        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
        assert!(EngineConfig::from_json(r#"{"default_format": "xml"}"#).is_err());
    }
}
