//! # Draft-7 Validation
//!
//! [`SchemaValidator`] compiles one platform schema (draft-7) with a
//! retriever that routes external `$ref`s through the shared
//! [`SchemaFetcher`], then reports every violation of an instance as a
//! [`Violation`]: the instance location, the rendered message, and the
//! schema node that owns the failing keyword (used for hints and for
//! message enrichment).

use std::sync::Arc;

use gitops_core::DocumentPath;
use jsonschema::{ValidationOptions, Validator};
use serde_json::{json, Value};
use thiserror::Error;

use crate::fetch::{FetchError, SchemaFetcher};
use crate::message;
use crate::resolve::{FetchingRetriever, Resolved, SchemaResolver, Scope};

/// Why a schema could not be compiled.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A document referenced by the schema could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The schema document itself is not a valid draft-7 schema.
    #[error("invalid schema {location}: {reason}")]
    Invalid {
        /// URL of the schema, or `<inline>`.
        location: String,
        /// Compiler message.
        reason: String,
    },
}

/// One schema violation found in an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Location of the offending value in the instance.
    pub path: DocumentPath,
    /// Rendered message.
    pub message: String,
    /// JSON pointer of the failing keyword in the schema.
    pub schema_path: String,
    /// Name of the failing keyword (`maxLength`, `required`, ...).
    pub keyword: String,
    /// Schema node owning the failing keyword, when it could be located.
    pub schema: Option<Value>,
}

impl Violation {
    /// The `description` of the owning schema node, shown as a hint.
    pub fn description(&self) -> Option<&str> {
        self.schema.as_ref()?.get("description")?.as_str()
    }

    /// The value of the failing keyword in the owning schema node.
    pub fn keyword_value(&self) -> Option<&Value> {
        self.schema.as_ref()?.get(&self.keyword)
    }
}

/// A compiled schema plus the scope its references resolve against.
pub struct SchemaValidator {
    validator: Validator,
    scope: Scope,
    resolver: SchemaResolver,
}

impl SchemaValidator {
    /// Compile `schema`, loaded from `url`.
    ///
    /// Relative `$ref`s resolve against `url`. When the document carries no
    /// `$id`, `url` is injected as its `$id` before compilation.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Fetch`] with the first failed download when a
    /// referenced document is unavailable; [`SchemaError::Invalid`]
    /// otherwise.
    pub fn compile(
        fetcher: Arc<SchemaFetcher>,
        url: Option<&str>,
        schema: Arc<Value>,
    ) -> Result<Self, SchemaError> {
        let retriever = FetchingRetriever::new(Arc::clone(&fetcher));
        let opts = draft7_options(&retriever);

        let compiled = match (url, schema.as_ref()) {
            (Some(url), Value::Object(map)) if !map.contains_key("$id") => {
                let mut with_id = map.clone();
                with_id.insert("$id".to_string(), Value::String(url.to_string()));
                opts.build(&Value::Object(with_id))
            }
            _ => opts.build(&schema),
        };

        let validator = compiled.map_err(|e| build_error(&retriever, url, e))?;

        Ok(Self {
            validator,
            scope: Scope::new(url, schema),
            resolver: SchemaResolver::new(fetcher),
        })
    }

    /// The scope of the root schema document.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Resolver sharing this validator's fetch cache.
    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Collect every violation of `instance`, in validator order.
    pub fn violations(&self, instance: &Value) -> Vec<Violation> {
        self.validator
            .iter_errors(instance)
            .map(|error| {
                let schema_path = error.schema_path.to_string();
                let keyword = schema_path
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .replace("~1", "/")
                    .replace("~0", "~");
                let owner = self.resolver.keyword_owner(&self.scope, &schema_path);
                let schema = owner.as_ref().and_then(|o| o.node()).cloned();
                Violation {
                    path: DocumentPath::from_pointer(&error.instance_path.to_string(), instance),
                    message: message::render(&error, schema.as_ref()),
                    schema_path,
                    keyword,
                    schema,
                }
            })
            .collect()
    }
}

/// A compiled subschema, used to evaluate `if` conditions.
pub struct FragmentValidator {
    validator: Validator,
}

impl FragmentValidator {
    /// Compile the node `target` points at. References inside it resolve
    /// against the document it lives in.
    ///
    /// # Errors
    ///
    /// As [`SchemaValidator::compile`].
    pub fn compile(fetcher: Arc<SchemaFetcher>, target: &Resolved) -> Result<Self, SchemaError> {
        let retriever = FetchingRetriever::new(fetcher);
        let mut opts = draft7_options(&retriever);
        let compiled = match target.scope.url() {
            Some(url) => {
                opts.with_resource(
                    url.as_str(),
                    jsonschema::Draft::Draft7.create_resource(target.scope.document().clone()),
                );
                let mut reference = url.clone();
                reference.set_fragment(Some(&target.pointer));
                opts.build(&json!({ "$ref": reference.as_str() }))
            }
            None => opts.build(target.node().unwrap_or(&Value::Bool(true))),
        };
        let location = target.scope.url().map(|u| u.to_string());
        let validator = compiled.map_err(|e| build_error(&retriever, location.as_deref(), e))?;
        Ok(Self { validator })
    }

    /// Returns true when `instance` satisfies the subschema.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }
}

fn draft7_options(retriever: &FetchingRetriever) -> ValidationOptions {
    let mut opts = jsonschema::options();
    // `format` is an annotation only.
    opts.with_draft(jsonschema::Draft::Draft7)
        .should_validate_formats(false)
        .with_retriever(retriever.clone());
    opts
}

fn build_error(retriever: &FetchingRetriever, location: Option<&str>, error: jsonschema::ValidationError<'_>) -> SchemaError {
    match retriever.take_failure() {
        Some(failure) => SchemaError::Fetch(failure),
        None => SchemaError::Invalid {
            location: location.unwrap_or("<inline>").to_string(),
            reason: error.to_string(),
        },
    }
}
