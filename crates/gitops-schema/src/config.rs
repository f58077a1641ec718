//! Schema location configuration.
//!
//! Defaults point to the shared platform bucket. Override via environment
//! variables or explicit construction for tests.

use std::time::Duration;

use url::Url;

/// Published location of the platform-managed chart schemas.
pub const DEFAULT_SCHEMA_BASE_URL: &str =
    "https://kp-helmchart-stable-shared-main.s3.eu-west-1.amazonaws.com/schema/platform-managed-chart";

/// Default per-request timeout for schema downloads.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where versioned schema documents live and how long to wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Base URL; versioned documents live under `{base}/v{version}/`.
    pub base_url: Url,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl SchemaConfig {
    /// Create a configuration for `base_url` with the default timeout.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("base_url", base_url)?,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `GITOPS_SCHEMA_BASE_URL` (default: [`DEFAULT_SCHEMA_BASE_URL`])
    /// - `GITOPS_SCHEMA_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = std::env::var("GITOPS_SCHEMA_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_SCHEMA_BASE_URL.to_string());
        Ok(Self {
            base_url: parse_base_url("GITOPS_SCHEMA_BASE_URL", &raw)?,
            timeout_secs: std::env::var("GITOPS_SCHEMA_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// The base URL without a trailing slash, as used in header comments.
    pub fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// The request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// URL of the strict schema validated against for `version`.
    pub fn strict_schema_url(&self, version: &str) -> String {
        format!("{}/v{version}/schema-platform-managed-chart-strict.json", self.base())
    }

    /// URL of the editor schema referenced from values file headers.
    pub fn header_schema_url(&self, version: &str) -> String {
        format!("{}/v{version}/schema-platform-managed-chart.json", self.base())
    }
}

fn parse_base_url(source: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(source.to_string(), e.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
}
