//! # Apply Cluster
//!
//! Top-level command: configuration, provider clients and a cluster
//! description in, a [`RunReport`] out. Also runs the staging pipeline over
//! a dry run's inventory.

use super::engine::ConvergenceEngine;
use super::types::{RunMode, RunOptions, RunReport};
use crate::cloud::{CloudClientFactory, CloudClients, OperationPoller};
use crate::config::{ConfigurationError, ConvergeConfig};
use crate::context::Context;
use crate::error::{ConvergeError, ConvergeResult};
use crate::events::EventPublisher;
use crate::model::{default_builders, ClusterSpec, ModelBuilder};
use crate::staging::{ArtifactStore, ContainerRuntime, DockerCli, StageInventory, StageReport};
use crate::target::{ApiTarget, ConfigTarget, Target, TargetKind};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ApplyCluster {
    config: ConvergeConfig,
    factory: Arc<dyn CloudClientFactory>,
    cluster: ClusterSpec,
    builders: Vec<Arc<dyn ModelBuilder>>,
    publisher: Option<EventPublisher>,
    cancel: CancellationToken,
}

impl ApplyCluster {
    pub fn new(
        config: ConvergeConfig,
        factory: Arc<dyn CloudClientFactory>,
        cluster: ClusterSpec,
    ) -> Self {
        Self {
            config,
            factory,
            cluster,
            builders: default_builders(),
            publisher: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_builders(mut self, builders: Vec<Arc<dyn ModelBuilder>>) -> Self {
        self.builders = builders;
        self
    }

    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Shared by the engine, the operation poller and staging.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ConvergeConfig {
        &self.config
    }

    /// Run options as configured.
    pub fn options(&self) -> RunOptions {
        let options = if self.config.engine.dry_run {
            RunOptions::dry_run()
        } else {
            RunOptions::apply()
        };
        options.with_phases(self.config.engine.phases.iter().copied())
    }

    /// A fresh context with the model built and the configured target.
    pub fn context(&self) -> ConvergeResult<Context> {
        let cloud = self.factory.clients(
            &self.cluster.project,
            &self.cluster.region(),
            &self.cluster.zone,
        )?;
        let target = self.target(&cloud);
        let mut context = Context::new(cloud, self.cluster.clone(), target);
        context.build(&self.builders)?;
        Ok(context)
    }

    fn target(&self, cloud: &CloudClients) -> Target {
        match self.config.engine.target {
            TargetKind::Api => {
                let poller = OperationPoller::from_config(
                    cloud.operations(),
                    &self.config.poller,
                    self.cancel.clone(),
                );
                Target::Api(ApiTarget::new(cloud.clone(), poller))
            }
            TargetKind::Config => {
                Target::Config(ConfigTarget::new(&self.config.engine.config_output_dir))
            }
        }
    }

    fn engine(&self) -> ConvergenceEngine {
        let engine = ConvergenceEngine::new().with_cancellation(self.cancel.clone());
        match &self.publisher {
            Some(publisher) => engine.with_publisher(publisher.clone()),
            None => engine,
        }
    }

    pub async fn run(&self) -> ConvergeResult<RunReport> {
        self.run_with(&self.options()).await
    }

    pub async fn run_with(&self, options: &RunOptions) -> ConvergeResult<RunReport> {
        info!(
            cluster = %self.cluster.name,
            project = %self.cluster.project,
            zone = %self.cluster.zone,
            mode = ?options.mode,
            "Applying cluster"
        );
        self.engine().run(self.context()?, options).await
    }

    /// Discover the artifacts the model needs without changing anything.
    pub async fn dry_run(&self) -> ConvergeResult<RunReport> {
        let options = RunOptions {
            mode: RunMode::DryRun,
            ..self.options()
        };
        self.run_with(&options).await
    }

    /// Stage a dry run's inventory with the configured container tool.
    pub async fn stage(
        &self,
        report: &RunReport,
        store: Arc<dyn ArtifactStore>,
    ) -> ConvergeResult<StageReport> {
        let docker = DockerCli::from_config(&self.config.staging).map_err(|err| {
            ConfigurationError::invalid_value("staging.docker_executable", err.to_string())
        })?;
        self.stage_inventory(report, Arc::new(docker), store).await
    }

    /// Stage a dry run's inventory into the configured destinations.
    pub async fn stage_inventory(
        &self,
        report: &RunReport,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn ArtifactStore>,
    ) -> ConvergeResult<StageReport> {
        if report.mode != RunMode::DryRun {
            return Err(ConvergeError::InvalidModel {
                reason: "staging needs the inventory of a dry run".to_string(),
            });
        }
        let mut inventory = StageInventory::from_config(&self.config.staging, runtime, store)?;
        if let Some(publisher) = &self.publisher {
            inventory = inventory.with_publisher(publisher.clone());
        }
        inventory.run(&report.inventory, &self.cancel).await
    }
}
