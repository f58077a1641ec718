//! # gitops-core: Foundational Types for GitOps Values Validation
//!
//! This crate is the leaf of the workspace. It defines the value-level
//! primitives shared by the schema and validation crates and depends on
//! nothing internal.
//!
//! ## Contents
//!
//! - [`DocumentPath`]: the location of a node inside a merged values
//!   document, rendered either as a JSON path (`$.a.b[0]`) or as a slash
//!   path (`a/b/0`).
//! - [`Environment`]: the closed set of deployment environments.
//! - [`deep_merge`] / [`deep_merge_all`]: the layered values merge.
//! - [`load_yaml_file`] / [`yaml_to_json_value`]: YAML loading into
//!   `serde_json::Value`, which is the document model every other crate uses.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `gitops-*` crates.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod environment;
pub mod error;
pub mod merge;
pub mod path;
pub mod yaml;

pub use environment::{Environment, UnknownEnvironment};
pub use error::DocumentError;
pub use merge::{deep_merge, deep_merge_all};
pub use path::{DocumentPath, PathSegment};
pub use yaml::{load_yaml_file, parse_yaml_str, yaml_to_json_value, ParseFailure};
