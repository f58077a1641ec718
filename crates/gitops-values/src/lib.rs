//! # gitops-values: Service Instance Discovery and Validation
//!
//! Validates the Helm values of every service instance in a GitOps
//! repository against the schema of the platform-managed chart version the
//! service depends on.
//!
//! ## Flow
//!
//! [`GitOpsRepository`] discovers [`ServiceInstance`]s. For each instance,
//! [`ServiceInstanceValidator`] merges the values files, selects the schema
//! from the [`ChartDescriptor`], runs draft-7 validation plus the custom
//! checks declared in the schema, and reports [`ValidationError`]s. After a
//! failed instance, the caller repairs the values file headers with
//! [`ServiceInstance::sync_values_files_schema_header_version`].
//!
//! Repository-wide, [`unique_service_name_errors`] reports service names
//! used by more than one application.

pub mod chart;
pub mod error;
pub mod instance;
pub mod repository;
pub mod validator;
pub mod values_file;

pub use chart::{ChartDependency, ChartDescriptor, ChartError, MANAGED_CHART_NAME, MIN_SCHEMA_VERSION};
pub use error::{FatalError, ValidationError};
pub use instance::ServiceInstance;
pub use repository::{unique_service_name_errors, GitOpsRepository, GITOPS_DIR};
pub use validator::{
    CheckId, IgnoreTable, IgnoreTableError, ServiceInstanceValidator, ValidationContext,
};
pub use values_file::{merge_values, SchemaHeader, ValuesFile};
