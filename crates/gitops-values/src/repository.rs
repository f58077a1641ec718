//! # Repository Scanning
//!
//! Service instances are discovered from the directory convention
//! `gitops/<application>/<service>/values-<env>-<instance>.yaml`. The
//! instance part may itself contain dashes; files for an unknown
//! environment are skipped with a warning.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use gitops_core::{DocumentError, Environment};

use crate::error::ValidationError;
use crate::instance::ServiceInstance;

/// Directory holding the applications, relative to the repository root.
pub const GITOPS_DIR: &str = "gitops";

/// A GitOps repository checkout.
#[derive(Debug, Clone)]
pub struct GitOpsRepository {
    root: PathBuf,
    gitops_dir: PathBuf,
}

impl GitOpsRepository {
    /// A repository rooted at `root`; applications live in `root/gitops`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let gitops_dir = root.join(GITOPS_DIR);
        Self { root, gitops_dir }
    }

    /// Scan `dir` directly for `<application>/<service>/` directories.
    /// Report paths stay relative to `dir`.
    pub fn from_gitops_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            root: dir.clone(),
            gitops_dir: dir,
        }
    }

    /// The repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every service instance in the repository, sorted by instance file.
    ///
    /// A missing `gitops` directory yields no instances.
    pub fn service_instances(&self) -> Result<Vec<ServiceInstance>, DocumentError> {
        if !self.gitops_dir.is_dir() {
            tracing::warn!(dir = %self.gitops_dir.display(), "no gitops directory found");
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for application in subdirectories(&self.gitops_dir)? {
            for service in subdirectories(&application)? {
                for file in list_dir(&service)? {
                    if let Some(instance) = self.instance_for(&application, &service, &file) {
                        found.push((file, instance));
                    }
                }
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found.into_iter().map(|(_, instance)| instance).collect())
    }

    fn instance_for(&self, application: &Path, service: &Path, file: &Path) -> Option<ServiceInstance> {
        let file_name = file.file_name()?.to_str()?;
        let stem = file_name.strip_suffix(".yaml")?;
        let mut parts = stem.splitn(3, '-');
        if parts.next() != Some("values") {
            return None;
        }
        let (env, instance) = (parts.next()?, parts.next()?);

        let env = match env.parse::<Environment>() {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "skipping values file");
                return None;
            }
        };

        Some(ServiceInstance::new(
            dir_name(application)?,
            dir_name(service)?,
            env,
            instance,
            service,
            &self.root,
        ))
    }

    /// Errors for service names used under more than one application.
    pub fn validate_unique_service_names(&self) -> Result<Vec<ValidationError>, DocumentError> {
        Ok(unique_service_name_errors(&self.service_instances()?))
    }
}

/// One error per service name that appears under more than one
/// application, ordered by service name.
pub fn unique_service_name_errors(instances: &[ServiceInstance]) -> Vec<ValidationError> {
    let mut applications: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for instance in instances {
        applications
            .entry(instance.service_name.as_str())
            .or_default()
            .insert(instance.application_name.as_str());
    }

    applications
        .into_iter()
        .filter(|(_, apps)| apps.len() > 1)
        .map(|(service, apps)| {
            let apps: Vec<&str> = apps.into_iter().collect();
            ValidationError::infrastructure(
                format!(
                    "Service name '{service}' is used in multiple applications: {}. \
                     Service names must be unique across all applications.",
                    apps.join(", ")
                ),
                format!("{GITOPS_DIR}/*/{service}"),
            )
        })
        .collect()
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_string)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let read_err = |source| DocumentError::Read {
        path: dir.display().to_string(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.starts_with('.'));
        if !hidden {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    Ok(list_dir(dir)?.into_iter().filter(|p| p.is_dir()).collect())
}
