//! # Reference Resolution
//!
//! Platform schemas split their definitions across sibling documents under
//! the same versioned base URL and link them with `$ref`. Two consumers
//! need those references resolved, and both go through the same
//! [`SchemaFetcher`] cache:
//!
//! - the `jsonschema` validator, through [`FetchingRetriever`];
//! - the custom-check walker and violation enrichment, through
//!   [`SchemaResolver`], which works on explicit [`Scope`]s (the document a
//!   schema node lives in and that document's URL).
//!
//! Only JSON-pointer fragments (`#/definitions/x`) are supported. Draft-7
//! `$id` re-basing inside a document is not.

use std::error::Error;
use std::sync::Arc;

use jsonschema::{Retrieve, Uri};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::fetch::{FetchError, SchemaFetcher};
use crate::validate::{FragmentValidator, SchemaError};

/// `jsonschema` retriever backed by a [`SchemaFetcher`].
///
/// The validator only sees an opaque boxed error when a retrieval fails.
/// The retriever keeps the first typed [`FetchError`] so callers can tell
/// a missing schema from an access-denied one after a failed build.
#[derive(Debug, Clone)]
pub struct FetchingRetriever {
    fetcher: Arc<SchemaFetcher>,
    first_failure: Arc<Mutex<Option<FetchError>>>,
}

impl FetchingRetriever {
    /// Create a retriever that routes every external `$ref` through `fetcher`.
    pub fn new(fetcher: Arc<SchemaFetcher>) -> Self {
        Self {
            fetcher,
            first_failure: Arc::new(Mutex::new(None)),
        }
    }

    /// The first fetch failure seen by this retriever, if any.
    pub fn take_failure(&self) -> Option<FetchError> {
        self.first_failure.lock().take()
    }
}

impl Retrieve for FetchingRetriever {
    fn retrieve(&self, uri: &Uri<&str>) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let url = uri.as_str();
        match self.fetcher.fetch(url) {
            Ok(document) => Ok(document.as_ref().clone()),
            Err(e) => {
                let mut slot = self.first_failure.lock();
                if slot.is_none() {
                    *slot = Some(e.clone());
                }
                Err(Box::new(e))
            }
        }
    }
}

/// A schema document together with the URL it was loaded from.
#[derive(Debug, Clone)]
pub struct Scope {
    url: Option<Url>,
    document: Arc<Value>,
}

impl Scope {
    /// Create a scope. An unparsable `url` leaves the scope without a base,
    /// in which case only absolute references can leave the document.
    pub fn new(url: Option<&str>, document: Arc<Value>) -> Self {
        Self {
            url: url.and_then(|u| Url::parse(u).ok()),
            document,
        }
    }

    /// The document of this scope.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The URL of this scope's document, if known.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

/// Error resolving a `$ref`.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// The referenced document could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The reference is not a URL or pointer this resolver understands.
    #[error("cannot resolve reference '{reference}': {reason}")]
    InvalidReference {
        /// The `$ref` value.
        reference: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The JSON pointer does not address a node in the target document.
    #[error("reference '{reference}' points to nothing")]
    Dangling {
        /// The `$ref` value.
        reference: String,
    },
}

/// The target of a resolved reference: a scope plus a JSON pointer into it.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Document the target lives in.
    pub scope: Scope,
    /// JSON pointer of the target inside `scope`.
    pub pointer: String,
}

impl Resolved {
    /// The schema node addressed by this reference.
    pub fn node(&self) -> Option<&Value> {
        self.scope.document().pointer(&self.pointer)
    }

    /// The location `tokens` below this one, in the same document.
    pub fn child(&self, tokens: &[&str]) -> Resolved {
        let mut pointer = self.pointer.clone();
        for token in tokens {
            pointer.push('/');
            pointer.push_str(&escape_token(token));
        }
        Resolved {
            scope: self.scope.clone(),
            pointer,
        }
    }
}

/// Resolves `$ref`s relative to a [`Scope`], fetching sibling documents
/// through the shared cache.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    fetcher: Arc<SchemaFetcher>,
}

impl SchemaResolver {
    /// Create a resolver over `fetcher`.
    pub fn new(fetcher: Arc<SchemaFetcher>) -> Self {
        Self { fetcher }
    }

    /// Resolve `reference` found in a node of `scope`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::Fetch`] when the referenced document cannot be
    /// downloaded, [`ResolveError::Dangling`] when the pointer addresses
    /// nothing, [`ResolveError::InvalidReference`] for unsupported forms.
    pub fn resolve(&self, scope: &Scope, reference: &str) -> Result<Resolved, ResolveError> {
        let (location, fragment) = match reference.split_once('#') {
            Some((location, fragment)) => (location, fragment),
            None => (reference, ""),
        };
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(ResolveError::InvalidReference {
                reference: reference.to_string(),
                reason: "only JSON pointer fragments are supported".to_string(),
            });
        }

        let target_scope = if location.is_empty() {
            scope.clone()
        } else {
            let mut url = match scope.url() {
                Some(base) => base.join(location),
                None => Url::parse(location),
            }
            .map_err(|e| ResolveError::InvalidReference {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;
            url.set_fragment(None);

            if scope.url() == Some(&url) {
                scope.clone()
            } else {
                let document = self.fetcher.fetch(url.as_str())?;
                Scope {
                    url: Some(url),
                    document,
                }
            }
        };

        let resolved = Resolved {
            scope: target_scope,
            pointer: fragment.to_string(),
        };
        if resolved.node().is_none() {
            return Err(ResolveError::Dangling {
                reference: reference.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Compile the subschema at `target`, fetching through the shared cache.
    pub fn fragment_validator(&self, target: &Resolved) -> Result<FragmentValidator, SchemaError> {
        FragmentValidator::compile(Arc::clone(&self.fetcher), target)
    }

    /// Locate the schema node that owns the keyword at `schema_path`.
    ///
    /// `schema_path` is the JSON pointer reported by the validator, for
    /// instance `/properties/name/maxLength`; the result is the node holding
    /// `maxLength`. `$ref`s crossed along the way are followed, whether or
    /// not the path spells them out.
    pub fn keyword_owner(&self, scope: &Scope, schema_path: &str) -> Option<Resolved> {
        let mut tokens: Vec<String> = schema_path
            .split('/')
            .skip(1)
            .map(|t| t.replace("~1", "/").replace("~0", "~"))
            .collect();
        tokens.pop()?;

        let mut current = Resolved {
            scope: scope.clone(),
            pointer: String::new(),
        };
        for token in tokens {
            let node = current.node()?;
            let reference = node.get("$ref").and_then(Value::as_str);

            if token == "$ref" {
                if let Some(reference) = reference {
                    current = self.resolve(&current.scope, reference).ok()?;
                    continue;
                }
            }

            let child = format!("{}/{}", current.pointer, escape_token(&token));
            if current.scope.document().pointer(&child).is_some() {
                current.pointer = child;
                continue;
            }

            // The validator may omit `$ref` from the path; step through it.
            let reference = reference?;
            current = self.resolve(&current.scope, reference).ok()?;
            let child = format!("{}/{}", current.pointer, escape_token(&token));
            current.scope.document().pointer(&child)?;
            current.pointer = child;
        }
        Some(current)
    }
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}
