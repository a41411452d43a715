//! Configuration Loader
//!
//! Environment-aware loading. Sources are merged in this order, later ones
//! winning: compiled defaults, `clusterup.yaml`, `clusterup.{environment}.yaml`,
//! then `CLUSTERUP_*` environment variables (`__` separates nested keys, so
//! `CLUSTERUP_POLLER__INTERVAL_MS=500` sets `poller.interval_ms`).

use super::error::ConfigResult;
use super::ConvergeConfig;
use crate::constants::env as env_keys;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const BASE_FILE_NAME: &str = "clusterup";

pub struct ConfigManager {
    config: ConvergeConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        debug!(
            target_kind = %config.engine.target,
            dry_run = config.engine.dry_run,
            poll_interval_ms = config.poller.interval_ms,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: ConvergeConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &ConvergeConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn detect_environment() -> String {
        env::var(env_keys::ENVIRONMENT)
            .or_else(|_| env::var(env_keys::FALLBACK_ENVIRONMENT))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::current_dir()
            .map(|dir| dir.join("config"))
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<ConvergeConfig> {
        let base_file = config_directory.join(format!("{BASE_FILE_NAME}.yaml"));
        let env_file = config_directory.join(format!("{BASE_FILE_NAME}.{environment}.yaml"));

        let merged = Config::builder()
            .add_source(Config::try_from(&ConvergeConfig::default())?)
            .add_source(
                File::from(base_file)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                File::from(env_file)
                    .format(FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(env_keys::CONFIG_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(merged.try_deserialize()?)
    }
}
