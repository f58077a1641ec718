//! # gitops-schema: Versioned Schema Retrieval and Validation
//!
//! Platform-managed charts publish one JSON Schema (draft-7) per chart
//! version. This crate downloads those schemas, caches them for the
//! duration of a run, and validates merged values documents against them.
//!
//! ## Architecture
//!
//! - [`config`]: where schemas are published ([`SchemaConfig`]).
//! - [`fetch`]: memoized download through a pluggable [`SchemaTransport`].
//! - [`resolve`]: `$ref` resolution shared by the validator and by callers
//!   that walk schemas themselves.
//! - [`validate`]: [`SchemaValidator`] and [`Violation`].
//! - [`message`]: the stable violation wording.
//!
//! ## Crate Policy
//!
//! - One [`SchemaFetcher`] per run; every URL is requested at most once.
//! - HTTP 403 surfaces as [`FetchError::Unauthorized`] and is the only
//!   fatal failure. Callers abort on it.

pub mod config;
pub mod fetch;
pub mod message;
pub mod resolve;
pub mod validate;

pub use config::{ConfigError, SchemaConfig, DEFAULT_SCHEMA_BASE_URL};
pub use fetch::{FetchError, HttpTransport, SchemaFetcher, SchemaTransport};
pub use message::literal;
pub use resolve::{FetchingRetriever, ResolveError, Resolved, SchemaResolver, Scope};
pub use validate::{FragmentValidator, SchemaError, SchemaValidator, Violation};
