//! # Deployment Environment
//!
//! Service instances are deployed into one of a small, closed set of
//! environments. The environment is encoded in values and chart file names
//! (`values-<env>.yaml`, `Chart-<env>.yaml`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development clusters.
    Dev,
    /// Production clusters.
    Prod,
}

impl Environment {
    /// All environments, in declaration order.
    pub const ALL: [Environment; 2] = [Environment::Dev, Environment::Prod];

    /// The name used in file names and allow-lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown environment name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment '{0}', expected one of: dev, prod")]
pub struct UnknownEnvironment(pub String);

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        for env in Environment::ALL {
            assert_eq!(env.as_str().parse::<Environment>().unwrap(), env);
            assert_eq!(env.to_string(), env.as_str());
        }
    }

    #[test]
    fn unknown_environment_rejected() {
        let err = "staging".parse::<Environment>().unwrap_err();
        assert_eq!(err, UnknownEnvironment("staging".to_string()));
        assert!(err.to_string().contains("staging"));
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("Prod".parse::<Environment>().is_err());
    }
}
