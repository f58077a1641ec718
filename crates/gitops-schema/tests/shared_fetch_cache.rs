//! Integration test: several validators compiled from the same published
//! schema share one fetch cache, and violation messages keep their wording.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gitops_schema::{FetchError, SchemaConfig, SchemaFetcher, SchemaTransport, SchemaValidator};
use serde_json::{json, Value};

/// In-memory publication of schema documents, counting requests.
struct Bucket {
    documents: HashMap<String, Value>,
    requests: Arc<AtomicUsize>,
}

impl SchemaTransport for Bucket {
    fn get(&self, url: &str) -> Result<Value, FetchError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Missing { url: url.to_string() })
    }
}

fn published() -> (SchemaConfig, Arc<SchemaFetcher>, Arc<AtomicUsize>) {
    let config = SchemaConfig::new("https://schemas.test/platform-managed-chart").unwrap();
    let root = config.strict_schema_url("0.1.157");
    let common = root.replace("schema-platform-managed-chart-strict.json", "common.json");

    let mut documents = HashMap::new();
    documents.insert(
        root,
        json!({
            "type": "object",
            "properties": {
                "platform-managed-chart": {
                    "type": "object",
                    "properties": {
                        "serviceName": {"$ref": "common.json#/definitions/serviceName"},
                        "tier": {"enum": ["backend", "frontend"]},
                        "env": {
                            "type": "object",
                            "patternProperties": {"^[A-Z_][A-Z0-9_]*$": {"type": "string"}},
                            "additionalProperties": false
                        }
                    }
                }
            }
        }),
    );
    documents.insert(
        common,
        json!({
            "definitions": {
                "serviceName": {"type": "string", "pattern": "^[a-z][a-z0-9-]*$"}
            }
        }),
    );

    let requests = Arc::new(AtomicUsize::new(0));
    let fetcher = Arc::new(SchemaFetcher::new(Bucket {
        documents,
        requests: Arc::clone(&requests),
    }));
    (config, fetcher, requests)
}

fn compile(config: &SchemaConfig, fetcher: &Arc<SchemaFetcher>) -> SchemaValidator {
    let url = config.strict_schema_url("0.1.157");
    let schema = fetcher.fetch(&url).unwrap();
    SchemaValidator::compile(Arc::clone(fetcher), Some(&url), schema).unwrap()
}

#[test]
fn validators_for_same_version_fetch_each_document_once() {
    let (config, fetcher, requests) = published();
    let first = compile(&config, &fetcher);
    let second = compile(&config, &fetcher);

    let instance = json!({"platform-managed-chart": {"serviceName": "billing"}});
    assert!(first.violations(&instance).is_empty());
    assert!(second.violations(&instance).is_empty());
    assert_eq!(requests.load(Ordering::SeqCst), 2);
}

#[test]
fn messages_keep_established_wording() {
    let (config, fetcher, _) = published();
    let validator = compile(&config, &fetcher);

    let instance = json!({
        "platform-managed-chart": {
            "serviceName": "Billing",
            "tier": "batch",
            "env": {"lower-case": "x"}
        }
    });
    let mut messages: Vec<String> = validator
        .violations(&instance)
        .into_iter()
        .map(|v| v.message)
        .collect();
    messages.sort();

    assert_eq!(
        messages,
        vec![
            "'Billing' does not match '^[a-z][a-z0-9-]*$'".to_string(),
            "'batch' is not one of ['backend', 'frontend']".to_string(),
            "'lower-case' does not match any of the regexes: '^[A-Z_][A-Z0-9_]*$'".to_string(),
        ]
    );
}

#[test]
fn json_path_of_nested_violation() {
    let (config, fetcher, _) = published();
    let validator = compile(&config, &fetcher);
    let violations = validator.violations(&json!({"platform-managed-chart": {"tier": 3}}));
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].path.json_path(), "$.platform-managed-chart.tier");
}
