//! # YAML Documents
//!
//! Values files and chart files are YAML, but the rest of the workspace
//! works on `serde_json::Value` because that is what the schema validator
//! consumes. These helpers load a YAML file and convert it into the
//! equivalent JSON value tree.

use std::path::Path;

use serde_json::Value;

use crate::error::DocumentError;

/// Load and convert a YAML file.
///
/// An empty document (or one containing only comments) loads as `null`;
/// callers decide whether that means "empty mapping" or "invalid".
pub fn load_yaml_file(path: &Path) -> Result<Value, DocumentError> {
    let content = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_yaml_str(&content).map_err(|e| match e {
        ParseFailure::Yaml(reason) => DocumentError::InvalidYaml {
            path: path.display().to_string(),
            reason,
        },
        ParseFailure::Conversion(reason) => DocumentError::Conversion {
            path: path.display().to_string(),
            reason,
        },
    })
}

/// Why an in-memory YAML string could not be turned into a JSON value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The text is not valid YAML.
    Yaml(String),
    /// The YAML uses constructs JSON cannot represent.
    Conversion(String),
}

/// Parse YAML text into a JSON value. `<<` merge keys are expanded.
pub fn parse_yaml_str(content: &str) -> Result<Value, ParseFailure> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ParseFailure::Yaml(e.to_string()))?;
    yaml.apply_merge().map_err(|e| ParseFailure::Yaml(e.to_string()))?;
    yaml_to_json_value(&yaml).map_err(ParseFailure::Conversion)
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Tags are dropped and the tagged value is kept. Non-string mapping keys
/// are stringified the way YAML prints them; nested collections as keys
/// are rejected.
pub fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(serde_json::Number::from(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(serde_json::Number::from(u)))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => {
            let items: Result<Vec<Value>, String> = seq.iter().map(yaml_to_json_value).collect();
            Ok(Value::Array(items?))
        }
        serde_yaml::Value::Mapping(map) => {
            let mut json_map = serde_json::Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                json_map.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(json_map))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_nested_values() {
        let value = parse_yaml_str(
            r#"
platform-managed-chart:
  serviceName: billing
  replicas: 2
  enabled: true
  hosts:
    - a.example.com
"#,
        )
        .unwrap();
        assert_eq!(
            value,
            json!({
                "platform-managed-chart": {
                    "serviceName": "billing",
                    "replicas": 2,
                    "enabled": true,
                    "hosts": ["a.example.com"]
                }
            })
        );
    }

    #[test]
    fn comment_only_document_is_null() {
        let value = parse_yaml_str("# yaml-language-server: $schema=x\n\n").unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn numeric_keys_are_stringified() {
        let value = parse_yaml_str("ports:\n  8080: http\n").unwrap();
        assert_eq!(value, json!({"ports": {"8080": "http"}}));
    }

    #[test]
    fn merge_keys_are_expanded() {
        let value = parse_yaml_str("base: &b\n  a: 1\nchild:\n  <<: *b\n  c: 2\n").unwrap();
        assert_eq!(value["child"], json!({"a": 1, "c": 2}));
    }

    #[test]
    fn explicit_keys_win_over_merged_keys() {
        let value = parse_yaml_str("base: &b\n  a: 1\n  c: 0\nchild:\n  <<: *b\n  c: 2\n").unwrap();
        assert_eq!(value["child"], json!({"a": 1, "c": 2}));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let err = parse_yaml_str("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, ParseFailure::Yaml(_)));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_yaml_file(&dir.path().join("values.yaml")).unwrap_err();
        assert!(matches!(err, DocumentError::Read { .. }));
        assert!(err.path().ends_with("values.yaml"));
    }

    #[test]
    fn malformed_file_is_invalid_yaml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.yaml");
        std::fs::write(&path, "hosts: [a, b\n").unwrap();
        let err = load_yaml_file(&path).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidYaml { .. }), "got {err}");
    }
}
