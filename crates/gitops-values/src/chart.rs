//! # Chart Descriptor
//!
//! A service's `Chart.yaml` declares the version of the
//! `platform-managed-chart` dependency, and that version selects the schema
//! the values are validated against. An environment may pin a different
//! version in `Chart-<env>.yaml`, which is deep-merged over the base file.
//!
//! Charts older than [`MIN_SCHEMA_VERSION`] predate the published schemas
//! and are validated against the empty (permissive) schema.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gitops_core::{deep_merge_all, load_yaml_file, DocumentError, Environment};
use gitops_schema::{FetchError, SchemaConfig, SchemaFetcher};
use semver::Version;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Name of the dependency whose version selects the schema.
pub const MANAGED_CHART_NAME: &str = "platform-managed-chart";

/// First managed-chart version with a published schema.
pub const MIN_SCHEMA_VERSION: Version = Version::new(0, 1, 35);

/// Error loading a chart descriptor.
#[derive(Error, Debug)]
pub enum ChartError {
    /// A chart file could not be read or parsed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The merged chart lacks a required field or has the wrong shape.
    #[error("invalid chart '{path}': {reason}")]
    Invalid {
        /// Base chart file.
        path: String,
        /// What is wrong.
        reason: String,
    },

    /// The managed-chart version is not a semantic version.
    #[error("invalid platform-managed-chart version '{version}' in '{path}': {reason}")]
    InvalidVersion {
        /// Base chart file.
        path: String,
        /// The declared version.
        version: String,
        /// Parser message.
        reason: String,
    },
}

/// A chart dependency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartDependency {
    /// Dependency chart name.
    pub name: String,
    /// Declared version.
    #[serde(deserialize_with = "scalar_string")]
    pub version: String,
}

#[derive(Deserialize)]
struct ChartFile {
    name: String,
    #[serde(deserialize_with = "scalar_string")]
    version: String,
    #[serde(default)]
    dependencies: Option<Vec<ChartDependency>>,
}

/// Accepts `version: 1.2.3` and `version: 1.0` alike.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a version string, found {other}"
        ))),
    }
}

/// A parsed Helm chart descriptor.
#[derive(Debug)]
pub struct ChartDescriptor {
    /// Chart name.
    pub name: String,
    /// Chart version.
    pub version: String,
    /// Declared dependencies, in file order.
    pub dependencies: Vec<ChartDependency>,
    managed_version: Option<Version>,
    schema: OnceCell<Arc<Value>>,
}

impl ChartDescriptor {
    /// Load `base`, deep-merged with `overlay` when given.
    ///
    /// # Errors
    ///
    /// [`ChartError::Document`] when a file is unreadable or malformed,
    /// [`ChartError::Invalid`] when `name` or `version` is missing,
    /// [`ChartError::InvalidVersion`] when the managed-chart version is not
    /// a semantic version.
    pub fn from_files(base: &Path, overlay: Option<&Path>) -> Result<Self, ChartError> {
        let mut layers = vec![load_yaml_file(base)?];
        if let Some(overlay) = overlay {
            layers.push(load_yaml_file(overlay)?);
        }
        let invalid = |reason: String| ChartError::Invalid {
            path: base.display().to_string(),
            reason,
        };

        let merged = deep_merge_all(layers.into_iter().filter(|layer| !layer.is_null()));
        let chart: ChartFile = serde_json::from_value(merged).map_err(|e| invalid(e.to_string()))?;
        Self::new(base, chart.name, chart.version, chart.dependencies.unwrap_or_default())
    }

    /// Load `dir/Chart.yaml`, with `dir/Chart-<env>.yaml` merged over it
    /// when that file exists.
    pub fn for_environment(dir: &Path, env: Environment) -> Result<Self, ChartError> {
        let overlay = environment_chart_file(dir, env);
        Self::from_files(&dir.join("Chart.yaml"), overlay.as_deref())
    }

    fn new(
        path: &Path,
        name: String,
        version: String,
        dependencies: Vec<ChartDependency>,
    ) -> Result<Self, ChartError> {
        let managed_version = dependencies
            .iter()
            .find(|d| d.name == MANAGED_CHART_NAME)
            .map(|d| {
                Version::parse(&d.version).map_err(|e| ChartError::InvalidVersion {
                    path: path.display().to_string(),
                    version: d.version.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            name,
            version,
            dependencies,
            managed_version,
            schema: OnceCell::new(),
        })
    }

    /// Look up a dependency by exact name.
    pub fn dependency(&self, name: &str) -> Option<&ChartDependency> {
        self.dependencies.iter().find(|d| d.name == name)
    }

    /// The declared `platform-managed-chart` version, verbatim.
    pub fn managed_chart_version(&self) -> Option<&str> {
        self.dependency(MANAGED_CHART_NAME).map(|d| d.version.as_str())
    }

    /// URL of the strict schema for this chart, or `None` when the chart has
    /// no managed-chart dependency or predates [`MIN_SCHEMA_VERSION`].
    pub fn schema_url(&self, config: &SchemaConfig) -> Option<String> {
        let version = self.managed_version.as_ref()?;
        if *version < MIN_SCHEMA_VERSION {
            return None;
        }
        self.managed_chart_version()
            .map(|raw| config.strict_schema_url(raw))
    }

    /// The schema document for this chart.
    ///
    /// `{}` without calling `fetcher` when [`Self::schema_url`] is `None`.
    /// A successful result is cached on the descriptor.
    pub fn schema_document(
        &self,
        fetcher: &SchemaFetcher,
        config: &SchemaConfig,
    ) -> Result<Arc<Value>, FetchError> {
        if let Some(schema) = self.schema.get() {
            return Ok(Arc::clone(schema));
        }
        let schema = match self.schema_url(config) {
            Some(url) => fetcher.fetch(&url)?,
            None => Arc::new(Value::Object(serde_json::Map::new())),
        };
        Ok(Arc::clone(self.schema.get_or_init(|| schema)))
    }
}

fn environment_chart_file(dir: &Path, env: Environment) -> Option<PathBuf> {
    let path = dir.join(format!("Chart-{env}.yaml"));
    path.is_file().then_some(path)
}
