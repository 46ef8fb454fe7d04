//! Deployment environments and the storage roots they select.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidEnvironment;

/// Deployment context a pipeline invocation runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Current working directory.
    #[default]
    Local,
    /// Development bucket.
    Dev,
    /// Production bucket.
    Prod,
}

impl Environment {
    /// All supported environments, in CLI help order.
    pub const ALL: [Environment; 3] = [Environment::Local, Environment::Dev, Environment::Prod];

    /// Returns the lowercase name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }

    /// Returns true when artifacts live on the local filesystem.
    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Local)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = InvalidEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Environment::Local),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(InvalidEnvironment(other.to_string())),
        }
    }
}

/// Environment-scoped prefix under which all artifacts are stored.
///
/// `local` maps to an empty prefix (paths relative to the working directory),
/// `dev` and `prod` map to `s3://bucket-{env}/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageRoot {
    environment: Environment,
    prefix: String,
}

impl StorageRoot {
    /// Builds the root for an environment.
    pub fn for_environment(environment: Environment) -> Self {
        let prefix = if environment.is_local() {
            String::new()
        } else {
            format!("s3://bucket-{}/", environment)
        };
        Self {
            environment,
            prefix,
        }
    }

    /// The environment this root belongs to.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Raw prefix, empty for local storage.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Joins a relative key onto the root.
    pub fn join(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.trim_start_matches('/'))
    }

    /// Human readable description for logs.
    pub fn describe(&self) -> &str {
        if self.prefix.is_empty() {
            "local"
        } else {
            &self.prefix
        }
    }
}

impl fmt::Display for StorageRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
