//! Stack file parser
//!
//! Loads the compose document that becomes a stack's `StackFileContent`.
//! YAML and JSON files are both accepted.

use crate::error::{Result, StackError};
use serde_json::Value;
use std::path::Path;

/// Stack file parser
pub struct StackFileParser;

impl StackFileParser {
    /// Parse a stack file from path
    pub fn parse_file(path: &Path) -> Result<Value> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StackError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            serde_json::from_str(&content)?
        } else {
            Self::parse_str(&content)?
        };

        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse a stack document from YAML text
    pub fn parse_str(content: &str) -> Result<Value> {
        serde_yaml::from_str(content)
            .map_err(|e| StackError::Yaml(format!("Failed to parse YAML: {}", e)))
    }

    /// A stack document must be a mapping; missing services only warns
    pub fn validate(config: &Value) -> Result<()> {
        let Some(document) = config.as_object() else {
            return Err(StackError::InvalidConfig(
                "stack file must contain a mapping at the top level".to_string(),
            ));
        };

        if !document.contains_key("services") {
            tracing::warn!("stack file defines no services");
        }

        Ok(())
    }
}
