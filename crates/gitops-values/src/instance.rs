//! # Service Instances
//!
//! A service instance is one `(application, service, environment,
//! instance)` tuple under `gitops/<application>/<service>/`, identified by
//! its `values-<env>-<instance>.yaml` file.

use std::fmt;
use std::path::{Path, PathBuf};

use gitops_core::{DocumentError, Environment};
use serde_json::Value;

use crate::chart::{ChartDescriptor, ChartError};
use crate::values_file::{merge_values, SchemaHeader, ValuesFile};

/// One deployable configuration unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    /// Application folder name.
    pub application_name: String,
    /// Service folder name.
    pub service_name: String,
    /// Target environment.
    pub env: Environment,
    /// Instance name; may contain dashes.
    pub instance: String,
    /// Service directory.
    pub path: PathBuf,
    root: PathBuf,
}

impl ServiceInstance {
    /// Describe an instance living in `path`. `root` is the repository root
    /// that report paths are made relative to.
    pub fn new(
        application_name: impl Into<String>,
        service_name: impl Into<String>,
        env: Environment,
        instance: impl Into<String>,
        path: impl Into<PathBuf>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            application_name: application_name.into(),
            service_name: service_name.into(),
            env,
            instance: instance.into(),
            path: path.into(),
            root: root.into(),
        }
    }

    /// The group a service's topics may be named after.
    pub fn service_group(&self) -> &str {
        &self.service_name
    }

    /// Name of the service directory, which service names must match.
    pub fn folder_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.service_name)
    }

    /// The service directory relative to the repository root.
    pub fn rel_path(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(&self.path)
    }

    /// The values files that exist, in merge order: `values.yaml`,
    /// `values-<env>.yaml`, `values-<env>-<instance>.yaml`.
    pub fn values_files(&self) -> Vec<ValuesFile> {
        [
            "values.yaml".to_string(),
            format!("values-{}.yaml", self.env),
            format!("values-{}-{}.yaml", self.env, self.instance),
        ]
        .into_iter()
        .map(|name| self.path.join(name))
        .filter(|path| path.is_file())
        .map(ValuesFile::new)
        .collect()
    }

    /// The merged values document.
    pub fn configuration(&self) -> Result<Value, DocumentError> {
        merge_values(&self.values_files())
    }

    /// The chart descriptor for this instance's environment.
    pub fn chart(&self) -> Result<ChartDescriptor, ChartError> {
        ChartDescriptor::for_environment(&self.path, self.env)
    }

    /// Point every values file header at the managed chart version.
    ///
    /// Does nothing when the chart declares no managed-chart version.
    /// Returns the number of files rewritten.
    pub fn sync_values_files_schema_header_version(
        &self,
        header: &SchemaHeader,
    ) -> Result<usize, ChartError> {
        let chart = self.chart()?;
        let Some(version) = chart.managed_chart_version() else {
            return Ok(0);
        };
        let mut updated = 0;
        for file in self.values_files() {
            if file.set_header_schema_version(header, version)? {
                updated += 1;
            }
        }
        Ok(updated)
    }
}

impl fmt::Display for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {} instance {} configuration",
            self.application_name, self.service_name, self.instance, self.env
        )
    }
}
