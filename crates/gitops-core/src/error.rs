//! # Error Types
//!
//! Errors raised while loading a declarative document (values file or
//! chart file) from disk. They are always local to one file: callers turn
//! them into a per-instance report item rather than aborting the run.

use thiserror::Error;

/// Error while reading or parsing a YAML document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file does not exist or could not be read.
    #[error("cannot read '{path}': {source}")]
    Read {
        /// Path of the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file could not be rewritten.
    #[error("cannot write '{path}': {source}")]
    Write {
        /// Path of the file.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML.
    #[error("invalid YAML in '{path}': {reason}")]
    InvalidYaml {
        /// Path of the file.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// The YAML is valid but cannot be represented as a JSON document.
    #[error("cannot convert '{path}' to a JSON document: {reason}")]
    Conversion {
        /// Path of the file.
        path: String,
        /// Reason the conversion failed.
        reason: String,
    },
}

impl DocumentError {
    /// The path of the file this error refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::InvalidYaml { path, .. }
            | Self::Conversion { path, .. } => path,
        }
    }
}
