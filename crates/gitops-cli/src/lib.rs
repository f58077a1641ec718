//! # gitops-cli: the `gitops-values-validation` pre-commit hook
//!
//! Walks every service instance of a GitOps repository, prints a verdict
//! per instance with its errors, repairs values file headers of failed
//! instances, and reports service names shared between applications.
//!
//! Exit codes: `0` when everything is valid, `1` when errors were found,
//! `2` when a schema download was refused.

pub mod report;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use gitops_schema::{HttpTransport, SchemaConfig, SchemaFetcher};
use gitops_values::{
    unique_service_name_errors, GitOpsRepository, IgnoreTable, ServiceInstanceValidator, ValidationContext,
};

pub use report::Reporter;

/// Result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every instance passed.
    Clean,
    /// At least one error was reported.
    ErrorsFound,
    /// The run was aborted.
    Fatal,
}

impl Outcome {
    /// Process exit code.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::ErrorsFound => 1,
            Self::Fatal => 2,
        }
    }
}

/// Context for a real run: configuration from the environment, HTTPS
/// transport, and the built-in ignore table unless `ignore_file` is given.
pub fn build_context(ignore_file: Option<&Path>) -> anyhow::Result<ValidationContext> {
    let config = SchemaConfig::from_env().context("invalid schema configuration")?;
    let transport = HttpTransport::new(&config).context("cannot build HTTP client")?;
    let ignored = match ignore_file {
        Some(path) => IgnoreTable::from_file(path)?,
        None => IgnoreTable::builtin().context("built-in ignore table is invalid")?,
    };
    tracing::debug!(base_url = %config.base(), ignored_services = ignored.len(), "validation context ready");
    ValidationContext::new(config, Arc::new(SchemaFetcher::new(transport)), ignored)
        .context("cannot build the schema header pattern")
}

/// Validate every instance of `repository`, writing the report to
/// `reporter`.
///
/// # Errors
///
/// Scanning failures and report write failures. Validation findings are
/// part of the report, not errors.
pub fn run<W: Write>(
    repository: &GitOpsRepository,
    ctx: &ValidationContext,
    reporter: &mut Reporter<W>,
) -> anyhow::Result<Outcome> {
    let instances = repository
        .service_instances()
        .with_context(|| format!("cannot scan {}", repository.root().display()))?;
    tracing::info!(count = instances.len(), "service instances found");

    let mut outcome = Outcome::Clean;
    for instance in &instances {
        reporter.checking(instance)?;
        let errors = match ServiceInstanceValidator::new(ctx, instance).validate() {
            Ok(errors) => errors,
            Err(fatal) => {
                reporter.fatal(&fatal)?;
                return Ok(Outcome::Fatal);
            }
        };

        if errors.is_empty() {
            reporter.passed()?;
            continue;
        }
        outcome = Outcome::ErrorsFound;
        reporter.failed(instance, &errors)?;
        // Header mismatches may be among the errors; repair is harmless otherwise.
        if let Err(e) = instance.sync_values_files_schema_header_version(&ctx.header) {
            tracing::warn!(%instance, error = %e, "schema header repair failed");
        }
    }

    let duplicates = unique_service_name_errors(&instances);
    if !duplicates.is_empty() {
        outcome = Outcome::ErrorsFound;
        reporter.repository_errors(&duplicates)?;
    }
    Ok(outcome)
}
