//! # Validation Outcomes
//!
//! Everything a run reports about one service instance is a
//! [`ValidationError`]. Only [`FatalError`] stops the run.

use std::fmt;

use gitops_core::DocumentPath;
use thiserror::Error;

/// One reported problem.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A violation found inside the merged values document, either by the
    /// schema or by a custom check.
    Schema {
        /// Location of the offending node.
        path: DocumentPath,
        /// Rendered message.
        message: String,
        /// Optional remediation text; the first line is the title.
        hint: Option<String>,
    },

    /// A problem with the files around the document: missing schema,
    /// unreadable chart, header drift, duplicate service names.
    Infrastructure {
        /// Rendered message.
        message: String,
        /// Free-form location (a URL, a file name, a directory).
        location: String,
        /// Optional remediation text.
        hint: Option<String>,
    },
}

impl ValidationError {
    /// Convenience constructor for an infrastructure error without hint.
    pub fn infrastructure(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
            location: location.into(),
            hint: None,
        }
    }

    /// The message.
    pub fn message(&self) -> &str {
        match self {
            Self::Schema { message, .. } | Self::Infrastructure { message, .. } => message,
        }
    }

    /// The location as shown to the user: `a/b/0` for document paths.
    pub fn location(&self) -> String {
        match self {
            Self::Schema { path, .. } => path.to_string(),
            Self::Infrastructure { location, .. } => location.clone(),
        }
    }

    /// The hint, if any.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Schema { hint, .. } | Self::Infrastructure { hint, .. } => hint.as_deref(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at: {})", self.message(), self.location())
    }
}

/// A condition that aborts the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// The schema bucket refused access, usually because the VPN is down.
    #[error("Unauthorized to download schema at {url}")]
    UnauthorizedToDownloadSchema {
        /// URL that was refused.
        url: String,
    },
}
