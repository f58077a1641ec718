//! Per-service suppression of known violations.
//!
//! The table maps a service folder name and the JSON path of a node to the
//! exact messages to drop. Matching is byte-exact: if the wording of a
//! message changes, the entry stops matching.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use thiserror::Error;

const BUILTIN_TABLE: &str = include_str!("../../data/ignored-validation-errors.yaml");

/// Error loading an ignore table.
#[derive(Error, Debug)]
pub enum IgnoreTableError {
    /// The file could not be read.
    #[error("cannot read ignore table '{path}': {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a `service -> path -> [message]` mapping.
    #[error("invalid ignore table '{path}': {reason}")]
    Parse {
        /// Path of the file, or `<builtin>`.
        path: String,
        /// Parser message.
        reason: String,
    },
}

/// Known violations to suppress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreTable {
    entries: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl IgnoreTable {
    /// The table shipped with the hook.
    pub fn builtin() -> Result<Self, IgnoreTableError> {
        Self::parse("<builtin>", BUILTIN_TABLE)
    }

    /// Parse a table from YAML text. Empty text is an empty table.
    pub fn from_yaml_str(content: &str) -> Result<Self, IgnoreTableError> {
        Self::parse("<inline>", content)
    }

    /// Load a table from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, IgnoreTableError> {
        let content = std::fs::read_to_string(path).map_err(|source| IgnoreTableError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&path.display().to_string(), &content)
    }

    fn parse(origin: &str, content: &str) -> Result<Self, IgnoreTableError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<BTreeMap<String, BTreeMap<String, BTreeSet<String>>>> =
            serde_yaml::from_str(content).map_err(|e| IgnoreTableError::Parse {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    /// Returns true when `message` at `json_path` is suppressed for `service`.
    pub fn is_ignored(&self, service: &str, json_path: &str, message: &str) -> bool {
        self.entries
            .get(service)
            .and_then(|paths| paths.get(json_path))
            .is_some_and(|messages| messages.contains(message))
    }

    /// Number of services with entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is suppressed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_loads() {
        let table = IgnoreTable::builtin().unwrap();
        assert!(table.is_ignored(
            "route-finder-api",
            "$.platform-managed-chart.api.startupProbe.initialDelaySeconds",
            "2400 is greater than the maximum of 300",
        ));
        assert!(table.is_ignored(
            "maritime-news-strapi-api",
            "$",
            "Additional properties are not allowed ('extra' was unexpected)",
        ));
    }

    #[test]
    fn match_is_exact() {
        let table = IgnoreTable::builtin().unwrap();
        let path = "$.platform-managed-chart.serviceName";
        let message = "'earth-observation-product-catalog-api' is too long, the maximum length is 36";
        assert!(table.is_ignored("earth-observation-product-catalog-api", path, message));
        assert!(!table.is_ignored("earth-observation-product-catalog-api", path, "'earth-observation-product-catalog-api' is too long"));
        assert!(!table.is_ignored("another-service", path, message));
        assert!(!table.is_ignored("earth-observation-product-catalog-api", "$.serviceName", message));
    }

    #[test]
    fn empty_text_is_empty_table() {
        assert!(IgnoreTable::from_yaml_str("").unwrap().is_empty());
    }

    #[test]
    fn wrong_shape_rejected() {
        let err = IgnoreTable::from_yaml_str("svc: [a, b]\n").unwrap_err();
        assert!(matches!(err, IgnoreTableError::Parse { .. }));
    }

    #[test]
    fn file_replaces_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignored.yaml");
        std::fs::write(&path, "billing:\n  \"$.a\":\n    - \"boom\"\n").unwrap();
        let table = IgnoreTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.is_ignored("billing", "$.a", "boom"));
        assert!(!table.is_ignored("route-finder-api", "$.platform-managed-chart.api.startupProbe.initialDelaySeconds", "2400 is greater than the maximum of 300"));
    }
}
