//! # Values Files
//!
//! One service instance is configured by up to three layered values files.
//! Each file may carry a header comment pointing editors at the schema of
//! the chart version it was last validated against:
//!
//! ```text
//! # yaml-language-server: $schema={base}/v0.1.157/schema-platform-managed-chart.json
//! ```
//!
//! [`SchemaHeader`] reads and rewrites that comment; [`ValuesFile`] wraps
//! one file on disk.

use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};

use gitops_core::{deep_merge_all, load_yaml_file, DocumentError};
use gitops_schema::SchemaConfig;
use regex::{NoExpand, Regex};
use serde_json::Value;

const HEADER_PREFIX: &str = "# yaml-language-server: $schema=";
const HEADER_SCHEMA_FILE: &str = "schema-platform-managed-chart.json";

/// The schema header comment for one schema base URL.
#[derive(Debug, Clone)]
pub struct SchemaHeader {
    base: String,
    pattern: Regex,
}

impl SchemaHeader {
    /// Header for the configured schema base URL.
    pub fn new(config: &SchemaConfig) -> Result<Self, regex::Error> {
        Self::for_base(config.base())
    }

    /// Header for an explicit base URL (no trailing slash).
    pub fn for_base(base: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?m)^ *{}{}/v(?P<version>[^/]+)/{}",
            regex::escape(HEADER_PREFIX),
            regex::escape(base),
            regex::escape(HEADER_SCHEMA_FILE),
        ))?;
        Ok(Self {
            base: base.to_string(),
            pattern,
        })
    }

    /// The header line for `version`, without newline.
    pub fn line(&self, version: &str) -> String {
        format!("{HEADER_PREFIX}{}/v{version}/{HEADER_SCHEMA_FILE}", self.base)
    }

    /// Version of the first header in `content`.
    pub fn version_in(&self, content: &str) -> Option<String> {
        self.pattern
            .captures(content)
            .and_then(|caps| caps.name("version"))
            .map(|m| m.as_str().to_string())
    }

    /// `content` with its header set to `version`, or `None` when it
    /// already is.
    ///
    /// Without a header, one is prepended. Otherwise every header is
    /// replaced in place and all other bytes are kept.
    pub fn rewrite(&self, content: &str, version: &str) -> Option<String> {
        let line = self.line(version);
        match self.version_in(content) {
            Some(current) if current == version => None,
            Some(_) => Some(self.pattern.replace_all(content, NoExpand(&line)).into_owned()),
            None => Some(format!("{line}\n{content}")),
        }
    }
}

/// One values file on disk.
///
/// The parsed values are cached after the first read; the header is read
/// from disk on every call so that it reflects repairs.
#[derive(Debug)]
pub struct ValuesFile {
    path: PathBuf,
    values: OnceCell<Value>,
}

impl ValuesFile {
    /// Wrap the file at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            values: OnceCell::new(),
        }
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file name, as shown in reports.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// The parsed values. An empty file yields `{}`.
    ///
    /// # Errors
    ///
    /// [`DocumentError`] when the file is unreadable, malformed, or its top
    /// level is not a mapping.
    pub fn values(&self) -> Result<&Value, DocumentError> {
        if let Some(values) = self.values.get() {
            return Ok(values);
        }
        let values = match load_yaml_file(&self.path)? {
            Value::Null => Value::Object(serde_json::Map::new()),
            mapping @ Value::Object(_) => mapping,
            _ => {
                return Err(DocumentError::Conversion {
                    path: self.path.display().to_string(),
                    reason: "top level of a values file must be a mapping".to_string(),
                })
            }
        };
        Ok(self.values.get_or_init(|| values))
    }

    fn read(&self) -> Result<String, DocumentError> {
        std::fs::read_to_string(&self.path).map_err(|source| DocumentError::Read {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// The schema version in the file's header, if it has one.
    pub fn header_schema_version(&self, header: &SchemaHeader) -> Result<Option<String>, DocumentError> {
        Ok(header.version_in(&self.read()?))
    }

    /// Point the header at `version`. Returns true when the file changed.
    pub fn set_header_schema_version(
        &self,
        header: &SchemaHeader,
        version: &str,
    ) -> Result<bool, DocumentError> {
        let Some(updated) = header.rewrite(&self.read()?, version) else {
            return Ok(false);
        };
        std::fs::write(&self.path, updated).map_err(|source| DocumentError::Write {
            path: self.path.display().to_string(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), %version, "schema header updated");
        Ok(true)
    }
}

impl fmt::Display for ValuesFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Deep-merge the values of `files`, later files winning.
pub fn merge_values(files: &[ValuesFile]) -> Result<Value, DocumentError> {
    let layers = files
        .iter()
        .map(|file| file.values().cloned())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(deep_merge_all(layers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BASE: &str = "https://schemas.test/platform-managed-chart";

    fn header() -> SchemaHeader {
        SchemaHeader::for_base(BASE).unwrap()
    }

    #[test]
    fn extracts_version_with_leading_spaces() {
        let content = format!("  {}\nkey: 1\n", header().line("0.1.2"));
        assert_eq!(header().version_in(&content).as_deref(), Some("0.1.2"));
    }

    #[test]
    fn other_base_url_is_not_a_header() {
        let other = SchemaHeader::for_base("https://elsewhere.test/pmc").unwrap();
        let content = format!("{}\n", other.line("0.1.2"));
        assert_eq!(header().version_in(&content), None);
    }

    #[test]
    fn rewrite_prepends_missing_header() {
        let updated = header().rewrite("# comment\nkey: 1\n", "0.1.2").unwrap();
        assert_eq!(updated, format!("{}\n# comment\nkey: 1\n", header().line("0.1.2")));
    }

    #[test]
    fn rewrite_replaces_in_place() {
        let content = format!("# top\n{}\nkey: 1 # keep\n", header().line("0.1.1"));
        let updated = header().rewrite(&content, "0.1.2").unwrap();
        assert_eq!(updated, format!("# top\n{}\nkey: 1 # keep\n", header().line("0.1.2")));
    }

    #[test]
    fn rewrite_is_idempotent() {
        let once = header().rewrite("key: 1\n", "0.1.2").unwrap();
        assert_eq!(header().rewrite(&once, "0.1.2"), None);
    }

    #[test]
    fn dollar_signs_in_header_survive_replacement() {
        let content = format!("{}\n", header().line("0.1.1"));
        let updated = header().rewrite(&content, "0.1.2").unwrap();
        assert!(updated.contains("$schema="));
    }

    #[test]
    fn set_header_writes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        std::fs::write(&path, "key: 1\n").unwrap();
        let file = ValuesFile::new(&path);

        assert!(file.set_header_schema_version(&header(), "0.1.2").unwrap());
        let first = std::fs::read(&path).unwrap();
        assert!(!file.set_header_schema_version(&header(), "0.1.2").unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), first);
        assert_eq!(file.header_schema_version(&header()).unwrap().as_deref(), Some("0.1.2"));
    }

    #[test]
    fn empty_file_is_empty_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(ValuesFile::new(&path).values().unwrap(), &json!({}));
    }

    #[test]
    fn scalar_top_level_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        std::fs::write(&path, "just text\n").unwrap();
        let err = ValuesFile::new(&path).values().unwrap_err();
        assert!(matches!(err, DocumentError::Conversion { .. }));
    }

    #[test]
    fn layers_merge_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, content).unwrap();
            ValuesFile::new(path)
        };
        let files = vec![
            write("values.yaml", "pmc:\n  replicas: 1\n  hosts: [a, b]\n"),
            write("values-prod.yaml", "pmc:\n  hosts: [c]\n"),
            write("values-prod-eu.yaml", "pmc:\n  region: eu\n"),
        ];
        assert_eq!(
            merge_values(&files).unwrap(),
            json!({"pmc": {"replicas": 1, "hosts": ["c"], "region": "eu"}})
        );
    }
}
