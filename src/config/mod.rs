//! # Configuration System
//!
//! Layered configuration for convergence runs: compiled defaults, then YAML
//! files, then `CLUSTERUP_`-prefixed environment variables. The merged result
//! is validated before anything uses it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use clusterup_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let interval = manager.config().poller.interval();
//! let dry_run = manager.config().engine.dry_run;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{polling, render, staging};
use crate::target::TargetKind;
use crate::task::Phase;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ConvergeConfig {
    /// Convergence engine behaviour
    pub engine: EngineConfig,

    /// Waiting on asynchronous cloud operations
    pub poller: PollerConfig,

    /// Artifact staging pipeline
    pub staging: StagingConfig,
}

impl ConvergeConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.poller.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where rendered changes go
    pub target: TargetKind,
    /// Discover and plan only; no mutation, no artifact written
    pub dry_run: bool,
    /// Restrict the run to these phases; empty means every phase
    pub phases: Vec<Phase>,
    /// Output directory for the declarative target
    pub config_output_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target: TargetKind::Api,
            dry_run: false,
            phases: Vec::new(),
            config_output_dir: PathBuf::from(render::DEFAULT_OUTPUT_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    pub timeout_seconds: u64,
    pub long_operation_seconds: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: polling::DEFAULT_INTERVAL.as_millis() as u64,
            timeout_seconds: polling::DEFAULT_TIMEOUT.as_secs(),
            long_operation_seconds: polling::LONG_OPERATION_THRESHOLD.as_secs(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn long_operation_threshold(&self) -> Duration {
        Duration::from_secs(self.long_operation_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "poller.interval_ms",
                "must be greater than zero",
            ));
        }
        if self.timeout() < self.interval() {
            return Err(ConfigurationError::invalid_value(
                "poller.timeout_seconds",
                "must not be shorter than the poll interval",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Base location that binary assets are copied under
    pub file_destination: Option<String>,
    /// Registry repository that container images are pushed into
    pub container_repository: Option<String>,
    pub stage_files: bool,
    pub stage_containers: bool,
    /// Where downloaded image archives are written before loading
    pub scratch_dir: PathBuf,
    pub docker_executable: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            file_destination: None,
            container_repository: None,
            stage_files: true,
            stage_containers: true,
            scratch_dir: PathBuf::from(staging::DEFAULT_SCRATCH_DIR),
            docker_executable: staging::DEFAULT_DOCKER_EXECUTABLE.to_string(),
        }
    }
}

impl StagingConfig {
    /// File destination without a trailing `/`.
    pub fn file_destination(&self) -> Option<&str> {
        self.file_destination
            .as_deref()
            .map(|dest| dest.trim_end_matches('/'))
            .filter(|dest| !dest.is_empty())
    }

    pub fn container_repository(&self) -> Option<&str> {
        self.container_repository
            .as_deref()
            .filter(|repo| !repo.is_empty())
    }

    /// Checked only when staging is actually requested.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.stage_files && !self.stage_containers {
            return Err(ConfigurationError::invalid_value(
                "staging",
                "at least one of stage_files or stage_containers must be enabled",
            ));
        }
        if self.stage_files && self.file_destination().is_none() {
            return Err(ConfigurationError::missing_required(
                "staging.file_destination",
                "required when stage_files is enabled",
            ));
        }
        if self.stage_containers && self.container_repository().is_none() {
            return Err(ConfigurationError::missing_required(
                "staging.container_repository",
                "required when stage_containers is enabled",
            ));
        }
        Ok(())
    }
}
