//! # Render Targets
//!
//! Where converged changes go. The target is chosen once per run:
//!
//! - [`ApiTarget`] applies changes immediately through provider calls and
//!   waits on the resulting operations.
//! - [`ConfigTarget`] writes a declarative description of the model that an
//!   external tool applies later.

pub mod api;
pub mod config;

pub use api::ApiTarget;
pub use config::ConfigTarget;

use crate::error::ConvergeResult;
use crate::task::{TaskId, TaskOutputs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Api,
    Config,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Config => write!(f, "config"),
        }
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(Self::Api),
            "config" => Ok(Self::Config),
            _ => Err(format!("Unknown target: {s}")),
        }
    }
}

#[derive(Debug)]
pub enum Target {
    Api(ApiTarget),
    Config(ConfigTarget),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Self::Api(_) => TargetKind::Api,
            Self::Config(_) => TargetKind::Config,
        }
    }

    /// Record the observed attributes of a resource that is not rendered.
    pub fn bind(&self, task: &TaskId, outputs: &TaskOutputs) {
        if let Self::Config(config) = self {
            config.bind(task, outputs);
        }
    }

    /// Flush anything the target buffered. Returns the artifact written, if any.
    pub async fn finish(&self) -> ConvergeResult<Option<PathBuf>> {
        match self {
            Self::Api(_) => Ok(None),
            Self::Config(config) => config.finish().await.map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind_strings() {
        assert_eq!("config".parse::<TargetKind>().unwrap(), TargetKind::Config);
        assert_eq!(TargetKind::Api.to_string(), "api");
        assert!("terraform".parse::<TargetKind>().is_err());
    }
}
