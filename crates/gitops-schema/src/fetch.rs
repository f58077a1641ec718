//! # Schema Retrieval
//!
//! Schema documents are published per chart version under a fixed base
//! URL. [`SchemaFetcher`] downloads each distinct URL at most once per run
//! and memoizes the outcome, failures included, so that a schema shared by
//! many service instances costs a single request.
//!
//! The network is hidden behind [`SchemaTransport`]: production uses
//! [`HttpTransport`] (blocking `reqwest`, fixed timeout, no retries); tests
//! plug in an in-memory transport.
//!
//! ## Failure classes
//!
//! | HTTP outcome        | [`FetchError`] variant | Handling                   |
//! |---------------------|------------------------|----------------------------|
//! | 403                 | `Unauthorized`         | aborts the whole run       |
//! | 404                 | `Missing`              | one report item, run goes on |
//! | other non-2xx       | `Status`               | one report item            |
//! | connect / timeout   | `Transport`            | one report item            |
//! | body is not JSON    | `InvalidJson`          | one report item            |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::config::SchemaConfig;

/// Why a schema document could not be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server refused access (HTTP 403).
    #[error("unauthorized to download schema at {url}")]
    Unauthorized {
        /// Requested URL.
        url: String,
    },

    /// No schema is published at this URL (HTTP 404).
    #[error("schema not found at {url}")]
    Missing {
        /// Requested URL.
        url: String,
    },

    /// Any other non-success HTTP status.
    #[error("downloading schema at {url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Connection failure, TLS failure, or timeout.
    #[error("cannot download schema at {url}: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error message.
        reason: String,
    },

    /// The response body is not a JSON document.
    #[error("schema at {url} is not valid JSON: {reason}")]
    InvalidJson {
        /// Requested URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

impl FetchError {
    /// The URL that failed.
    pub fn url(&self) -> &str {
        match self {
            Self::Unauthorized { url }
            | Self::Missing { url }
            | Self::Status { url, .. }
            | Self::Transport { url, .. }
            | Self::InvalidJson { url, .. } => url,
        }
    }

    /// Returns true when the failure must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

/// Retrieves one JSON document by URL.
///
/// Implementations must map HTTP 403 to [`FetchError::Unauthorized`] and
/// HTTP 404 to [`FetchError::Missing`]. `Send + Sync` is required because
/// the fetcher is shared with the `jsonschema` retriever.
pub trait SchemaTransport: Send + Sync {
    /// Fetch and parse the document at `url`.
    fn get(&self, url: &str) -> Result<Value, FetchError>;
}

/// Blocking HTTPS transport.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build a client with the configured per-request timeout.
    pub fn new(config: &SchemaConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }
}

impl SchemaTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<Value, FetchError> {
        let response = self.client.get(url).send().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: if e.is_timeout() {
                format!("request timed out: {e}")
            } else {
                e.to_string()
            },
        })?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(FetchError::Unauthorized {
                url: url.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(FetchError::Missing {
                url: url.to_string(),
            }),
            status if !status.is_success() => Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            _ => response.json::<Value>().map_err(|e| FetchError::InvalidJson {
                url: url.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Memoizing schema fetcher.
///
/// One instance is created per run. Every URL is requested from the
/// transport at most once; later calls return the cached document or the
/// cached failure.
pub struct SchemaFetcher {
    transport: Box<dyn SchemaTransport>,
    cache: Mutex<HashMap<String, Result<Arc<Value>, FetchError>>>,
}

impl SchemaFetcher {
    /// Create a fetcher with an empty cache.
    pub fn new(transport: impl SchemaTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the document at `url`, from cache when possible.
    pub fn fetch(&self, url: &str) -> Result<Arc<Value>, FetchError> {
        if let Some(cached) = self.cache.lock().get(url) {
            tracing::trace!(%url, "schema cache hit");
            return cached.clone();
        }

        tracing::debug!(%url, "downloading schema");
        let result = self.transport.get(url).map(Arc::new);
        if let Err(e) = &result {
            tracing::debug!(%url, error = %e, "schema download failed");
        }

        self.cache.lock().insert(url.to_string(), result.clone());
        result
    }

    /// Returns true if `url` has already been requested.
    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.lock().contains_key(url)
    }

    /// Number of distinct URLs requested so far.
    pub fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }
}

impl fmt::Debug for SchemaFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaFetcher")
            .field("cached_urls", &self.cached_len())
            .finish_non_exhaustive()
    }
}
