//! # Service Instance Validation
//!
//! [`ServiceInstanceValidator::validate`] produces the ordered list of
//! [`ValidationError`]s for one service instance:
//!
//! 1. Load the chart and the merged values; failures become one error.
//! 2. Obtain the schema for the managed chart version. A missing schema
//!    becomes one error; an access-denied response aborts the run.
//! 3. Draft-7 validation, then the custom checks declared in the schema.
//! 4. Enrich `is too long` messages with the limit and drop violations
//!    listed in the [`IgnoreTable`].
//! 5. Compare each values file header with the managed chart version.
//!
//! The returned list holds every generic violation first, then every
//! custom-check violation, then header errors. A single combined validator
//! would interleave custom checks with generic violations as it meets
//! them; that order is not reproduced.
//!
//! Validation never writes to disk. Header repair is a separate step
//! ([`ServiceInstance::sync_values_files_schema_header_version`]).

pub mod checks;
pub mod ignore;
mod walk;

use std::sync::Arc;

use gitops_schema::{FetchError, SchemaConfig, SchemaError, SchemaFetcher, SchemaValidator, Violation};
use serde_json::Value;

use crate::error::{FatalError, ValidationError};
use crate::instance::ServiceInstance;
use crate::values_file::SchemaHeader;

pub use checks::{CheckContext, CheckFailure, CheckId};
pub use ignore::{IgnoreTable, IgnoreTableError};

const HEADER_FIX_HINT: &str =
    "This pre-commit hook will auto-fix this issue. Please commit the values files changes.";

/// Everything shared by the validation of all instances in one run.
#[derive(Debug)]
pub struct ValidationContext {
    /// Where schemas are published.
    pub config: SchemaConfig,
    /// The run's schema cache.
    pub fetcher: Arc<SchemaFetcher>,
    /// Header comment matching `config`.
    pub header: SchemaHeader,
    /// Suppressed violations.
    pub ignored: IgnoreTable,
}

impl ValidationContext {
    /// Assemble a context; the header is derived from `config`.
    pub fn new(
        config: SchemaConfig,
        fetcher: Arc<SchemaFetcher>,
        ignored: IgnoreTable,
    ) -> Result<Self, regex::Error> {
        let header = SchemaHeader::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            header,
            ignored,
        })
    }
}

/// Validates one service instance.
#[derive(Debug)]
pub struct ServiceInstanceValidator<'a> {
    ctx: &'a ValidationContext,
    instance: &'a ServiceInstance,
}

impl<'a> ServiceInstanceValidator<'a> {
    /// Validator for `instance` within the run described by `ctx`.
    pub fn new(ctx: &'a ValidationContext, instance: &'a ServiceInstance) -> Self {
        Self { ctx, instance }
    }

    /// Run every check on the instance.
    ///
    /// # Errors
    ///
    /// [`FatalError::UnauthorizedToDownloadSchema`] when the schema bucket
    /// refuses access. Every other problem is part of the returned list.
    pub fn validate(&self) -> Result<Vec<ValidationError>, FatalError> {
        let instance = self.instance;
        let chart = match instance.chart() {
            Ok(chart) => chart,
            Err(e) => {
                let location = instance.rel_path().join("Chart.yaml");
                return Ok(vec![ValidationError::infrastructure(
                    e.to_string(),
                    location.display().to_string(),
                )]);
            }
        };
        let version = chart.managed_chart_version();

        let schema = match chart.schema_document(&self.ctx.fetcher, &self.ctx.config) {
            Ok(schema) => schema,
            Err(e) => return self.fetch_failure(e, version).map(|error| vec![error]),
        };
        let validator = match SchemaValidator::compile(
            Arc::clone(&self.ctx.fetcher),
            chart.schema_url(&self.ctx.config).as_deref(),
            schema,
        ) {
            Ok(validator) => validator,
            Err(SchemaError::Fetch(e)) => return self.fetch_failure(e, version).map(|error| vec![error]),
            Err(e @ SchemaError::Invalid { .. }) => {
                let location = chart.schema_url(&self.ctx.config).unwrap_or_default();
                return Ok(vec![ValidationError::infrastructure(e.to_string(), location)]);
            }
        };

        let configuration = match instance.configuration() {
            Ok(configuration) => configuration,
            Err(e) => {
                let location = e.path().to_string();
                return Ok(vec![ValidationError::infrastructure(e.to_string(), location)]);
            }
        };

        let mut violations = validator.violations(&configuration);
        violations.extend(
            walk::CheckWalker::new(validator.resolver(), instance, &configuration).run(validator.scope()),
        );

        let mut errors: Vec<ValidationError> = violations
            .into_iter()
            .map(enrich)
            .filter(|v| !self.is_ignored(v))
            .map(|v| ValidationError::Schema {
                hint: v.description().map(str::to_string),
                path: v.path,
                message: v.message,
            })
            .collect();
        errors.extend(self.header_errors(version));
        Ok(errors)
    }

    fn fetch_failure(&self, error: FetchError, version: Option<&str>) -> Result<ValidationError, FatalError> {
        match error {
            FetchError::Unauthorized { url } => Err(FatalError::UnauthorizedToDownloadSchema { url }),
            FetchError::Missing { url } => Ok(ValidationError::infrastructure(
                format!(
                    "Missing JSON schema for platform managed chart version {} in Chart.yaml",
                    version.unwrap_or("None")
                ),
                url,
            )),
            other => Ok(ValidationError::infrastructure(other.to_string(), other.url())),
        }
    }

    fn is_ignored(&self, violation: &Violation) -> bool {
        let ignored = self.ctx.ignored.is_ignored(
            &self.instance.service_name,
            &violation.path.json_path(),
            &violation.message,
        );
        if ignored {
            tracing::debug!(
                instance = %self.instance,
                path = %violation.path.json_path(),
                message = %violation.message,
                "violation suppressed"
            );
        }
        ignored
    }

    fn header_errors(&self, version: Option<&str>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for file in self.instance.values_files() {
            let header = match file.header_schema_version(&self.ctx.header) {
                Ok(header) => header,
                Err(e) => {
                    errors.push(ValidationError::infrastructure(e.to_string(), format!("values file {file}")));
                    continue;
                }
            };
            if header.as_deref() != version {
                errors.push(ValidationError::Infrastructure {
                    message: format!(
                        "JSON schema version in header ({}) does not match version in Chart.yaml ({})",
                        header.as_deref().unwrap_or("None"),
                        version.unwrap_or("None"),
                    ),
                    location: format!("values file {file}"),
                    hint: Some(HEADER_FIX_HINT.to_string()),
                });
            }
        }
        errors
    }
}

/// Append the limit to `is too long` messages.
fn enrich(mut violation: Violation) -> Violation {
    if violation.message.ends_with("is too long") {
        let limit = violation
            .schema
            .as_ref()
            .and_then(|schema| schema.get("maxLength"))
            .filter(|limit| is_truthy(limit))
            .map(render_limit);
        if let Some(limit) = limit {
            violation.message.push_str(&format!(", the maximum length is {limit}"));
        }
    }
    violation
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn render_limit(limit: &Value) -> String {
    match limit {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
