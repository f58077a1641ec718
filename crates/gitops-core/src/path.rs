//! # Document Paths
//!
//! A [`DocumentPath`] is the ordered list of mapping keys and sequence
//! indices leading from the root of a values document to one node.
//!
//! Two renderings are used:
//!
//! - [`DocumentPath::json_path`]: `$.platform-managed-chart.serviceName`,
//!   `$.hosts[0]`. This is the key of the ignore table and must stay
//!   byte-stable.
//! - [`fmt::Display`]: `platform-managed-chart/serviceName`, shown to the
//!   user under `at:`.

use serde_json::Value;
use std::fmt;

/// One step in a [`DocumentPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
}

impl PathSegment {
    /// The key, if this segment is a mapping key.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Location of a node inside a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<PathSegment>,
}

impl DocumentPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from its segments.
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Parse a JSON Pointer (RFC 6901) such as `/a/b/0`.
    ///
    /// A pointer token is ambiguous between a mapping key and a sequence
    /// index. The ambiguity is resolved against `document`: a token that
    /// addresses a sequence is parsed as an index, anything else is a key.
    pub fn from_pointer(pointer: &str, document: &Value) -> Self {
        let mut segments = Vec::new();
        let mut current = Some(document);

        for raw in pointer.split('/').skip(1) {
            let token = raw.replace("~1", "/").replace("~0", "~");
            let segment = match (current, token.parse::<usize>()) {
                (Some(Value::Array(_)), Ok(index)) => PathSegment::Index(index),
                _ => PathSegment::Key(token),
            };
            current = current.and_then(|node| match (&segment, node) {
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
                (PathSegment::Key(key), Value::Object(map)) => map.get(key),
                _ => None,
            });
            segments.push(segment);
        }

        Self { segments }
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns true for the document root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// JSON path rendering: `$`, `$.a.b`, `$.a[0].b`.
    pub fn json_path(&self) -> String {
        let mut out = String::from("$");
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => {
                    out.push('.');
                    out.push_str(key);
                }
                PathSegment::Index(index) => {
                    out.push('[');
                    out.push_str(&index.to_string());
                    out.push(']');
                }
            }
        }
        out
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<Vec<PathSegment>> for DocumentPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl From<&[PathSegment]> for DocumentPath {
    fn from(segments: &[PathSegment]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_path_of_root() {
        assert_eq!(DocumentPath::root().json_path(), "$");
        assert!(DocumentPath::root().is_root());
    }

    #[test]
    fn json_path_with_keys_and_indices() {
        let path = DocumentPath::new(vec![
            "platform-managed-chart".into(),
            "hosts".into(),
            PathSegment::Index(0),
        ]);
        assert_eq!(path.json_path(), "$.platform-managed-chart.hosts[0]");
        assert_eq!(path.to_string(), "platform-managed-chart/hosts/0");
    }

    #[test]
    fn pointer_tokens_resolved_against_document() {
        let document = json!({
            "hosts": ["a", "b"],
            "ports": {"0": "zero"}
        });
        let hosts = DocumentPath::from_pointer("/hosts/1", &document);
        assert_eq!(hosts.segments(), &[PathSegment::Key("hosts".into()), PathSegment::Index(1)]);

        let ports = DocumentPath::from_pointer("/ports/0", &document);
        assert_eq!(ports.segments(), &[PathSegment::Key("ports".into()), PathSegment::Key("0".into())]);
    }

    #[test]
    fn pointer_escapes_are_decoded() {
        let document = json!({"a/b": {"c~d": 1}});
        let path = DocumentPath::from_pointer("/a~1b/c~0d", &document);
        assert_eq!(path.json_path(), "$.a/b.c~d");
    }

    #[test]
    fn empty_pointer_is_root() {
        assert!(DocumentPath::from_pointer("", &json!({})).is_root());
    }
}
