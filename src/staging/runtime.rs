//! Container image operations.

use super::error::RuntimeError;
use crate::config::StagingConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    async fn tag(&self, image: &str, new_tag: &str) -> Result<(), RuntimeError>;

    async fn push(&self, image: &str) -> Result<(), RuntimeError>;

    /// Import an image archive; returns the tool's combined output.
    async fn load(&self, archive: &Path) -> Result<String, RuntimeError>;

    /// Force-remove a local image.
    async fn remove(&self, image: &str) -> Result<(), RuntimeError>;
}

/// Drives the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    executable: PathBuf,
}

impl DockerCli {
    /// Resolve `name` on `PATH`.
    pub fn locate(name: &str) -> Result<Self, RuntimeError> {
        let executable = which::which(name).map_err(|source| RuntimeError::ExecutableNotFound {
            name: name.to_string(),
            source,
        })?;
        Ok(Self { executable })
    }

    /// Resolve the configured `docker_executable`.
    pub fn from_config(config: &StagingConfig) -> Result<Self, RuntimeError> {
        Self::locate(&config.docker_executable)
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, RuntimeError> {
        let command = format!("{} {}", self.executable.display(), args.join(" "));
        debug!(command = %command, "Running container tool");

        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .await
            .map_err(|source| RuntimeError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RuntimeError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: stderr_trim(&output),
            });
        }
        Ok(output)
    }
}

fn stderr_trim(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn pull(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["pull", image]).await.map(|_| ())
    }

    async fn tag(&self, image: &str, new_tag: &str) -> Result<(), RuntimeError> {
        self.run(&["tag", image, new_tag]).await.map(|_| ())
    }

    async fn push(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["push", image]).await.map(|_| ())
    }

    async fn load(&self, archive: &Path) -> Result<String, RuntimeError> {
        let archive = archive.to_string_lossy();
        let output = self.run(&["load", "-i", archive.as_ref()]).await?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(combined)
    }

    async fn remove(&self, image: &str) -> Result<(), RuntimeError> {
        self.run(&["rmi", "-f", image]).await.map(|_| ())
    }
}
