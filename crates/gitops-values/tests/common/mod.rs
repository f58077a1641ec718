//! Shared fixtures: an on-disk GitOps tree and an in-memory schema bucket.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gitops_core::Environment;
use gitops_schema::{FetchError, SchemaConfig, SchemaFetcher, SchemaTransport};
use gitops_values::{
    FatalError, IgnoreTable, SchemaHeader, ServiceInstance, ServiceInstanceValidator, ValidationContext,
    ValidationError,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const BASE: &str = "https://schemas.test/platform-managed-chart";

/// Schema bucket serving fixed documents and recording every request.
pub struct Bucket {
    documents: HashMap<String, Value>,
    forbidden: HashSet<String>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl SchemaTransport for Bucket {
    fn get(&self, url: &str) -> Result<Value, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.forbidden.contains(url) {
            return Err(FetchError::Unauthorized { url: url.to_string() });
        }
        self.documents
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Missing { url: url.to_string() })
    }
}

/// The strict schema used by most tests.
pub fn platform_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "platform-managed-chart": {
                "type": "object",
                "properties": {
                    "serviceName": {
                        "type": "string",
                        "maxLength": 36,
                        "description": "Name of the service.\nMust match the service folder.",
                        "additionalChecks": ["serviceNameMatchesServiceFolder"]
                    },
                    "image": {
                        "type": "object",
                        "properties": {
                            "repository": {"type": "string", "pattern": "^(dev|stable)/"}
                        }
                    },
                    "kafka": {
                        "type": "object",
                        "properties": {
                            "topics": {"type": "array", "items": {"$ref": "#/definitions/topic"}}
                        }
                    },
                    "env": {
                        "type": "object",
                        "additionalChecks": ["forbiddenEnvironmentVariables", "notImplementedYet"]
                    }
                }
            }
        },
        "definitions": {
            "topic": {
                "type": "object",
                "required": ["topicName"],
                "properties": {
                    "topicName": {"type": "string", "additionalChecks": ["topicNameCompliance"]},
                    "maxLocalTopicBytes": {"type": "integer"}
                },
                "additionalChecks": ["maxLocalTopicBytesCompliance"]
            }
        }
    })
}

pub struct Fixture {
    pub dir: TempDir,
    pub ctx: ValidationContext,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl Fixture {
    /// A repository whose bucket publishes the platform schema for the
    /// given versions and refuses access for `forbidden` versions.
    pub fn new(published: &[&str], forbidden: &[&str]) -> Self {
        let config = SchemaConfig::new(BASE).unwrap();
        let documents = published
            .iter()
            .map(|v| (config.strict_schema_url(v), platform_schema()))
            .collect();
        let forbidden = forbidden.iter().map(|v| config.strict_schema_url(v)).collect();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let fetcher = Arc::new(SchemaFetcher::new(Bucket {
            documents,
            forbidden,
            requests: Arc::clone(&requests),
        }));
        let ctx = ValidationContext::new(config, fetcher, IgnoreTable::builtin().unwrap()).unwrap();
        Self {
            dir: tempfile::tempdir().unwrap(),
            ctx,
            requests,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create `gitops/<app>/<service>/` with a chart on `version`.
    pub fn service(&self, app: &str, service: &str, version: &str) -> ServiceDir {
        let path = self.root().join("gitops").join(app).join(service);
        std::fs::create_dir_all(&path).unwrap();
        let dir = ServiceDir {
            path,
            header: self.ctx.header.clone(),
            version: version.to_string(),
        };
        dir.chart("Chart.yaml", version);
        dir
    }

    pub fn instance(&self, app: &str, service: &str, env: Environment, instance: &str) -> ServiceInstance {
        let path = self.root().join("gitops").join(app).join(service);
        ServiceInstance::new(app, service, env, instance, path, self.root())
    }

    pub fn validate(&self, instance: &ServiceInstance) -> Result<Vec<ValidationError>, FatalError> {
        ServiceInstanceValidator::new(&self.ctx, instance).validate()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

pub struct ServiceDir {
    pub path: PathBuf,
    header: SchemaHeader,
    version: String,
}

impl ServiceDir {
    pub fn chart(&self, file: &str, version: &str) -> &Self {
        self.raw(
            file,
            &format!(
                "apiVersion: v2\nname: service\nversion: 1.0.0\ndependencies:\n  - name: platform-managed-chart\n    version: {version}\n"
            ),
        )
    }

    /// Values file with a header matching the base chart version.
    pub fn values(&self, file: &str, body: &str) -> &Self {
        let content = format!("{}\n{body}", self.header.line(&self.version));
        self.raw(file, &content)
    }

    pub fn raw(&self, file: &str, content: &str) -> &Self {
        std::fs::write(self.path.join(file), content).unwrap();
        self
    }
}

pub fn messages(errors: &[ValidationError]) -> Vec<&str> {
    errors.iter().map(ValidationError::message).collect()
}
