//! # Convergence Context
//!
//! Everything one convergence run owns: provider clients, the cluster
//! description, the task set and the selected target. A context is built
//! fresh for each run and consumed by the engine.

use crate::cloud::{CloudClientFactory, CloudClients};
use crate::error::ConvergeResult;
use crate::model::{ClusterSpec, ModelBuilder, ModelBuilderContext, TaskSet};
use crate::target::Target;
use crate::task::DeltaTask;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct Context {
    cloud: CloudClients,
    cluster: Arc<ClusterSpec>,
    tasks: TaskSet,
    target: Target,
}

impl Context {
    pub fn new(cloud: CloudClients, cluster: impl Into<Arc<ClusterSpec>>, target: Target) -> Self {
        Self {
            cloud,
            cluster: cluster.into(),
            tasks: TaskSet::new(),
            target,
        }
    }

    /// Build clients for the cluster's location through `factory`.
    pub fn for_cluster(
        factory: &dyn CloudClientFactory,
        cluster: ClusterSpec,
        target: Target,
    ) -> ConvergeResult<Self> {
        let cloud = factory.clients(&cluster.project, &cluster.region(), &cluster.zone)?;
        Ok(Self::new(cloud, cluster, target))
    }

    /// Run every builder against the cluster description.
    pub fn build(&mut self, builders: &[Arc<dyn ModelBuilder>]) -> ConvergeResult<()> {
        let cluster = Arc::clone(&self.cluster);
        let mut ctx = ModelBuilderContext::new(&cluster, &mut self.tasks);
        for builder in builders {
            debug!(builder = builder.name(), "Running model builder");
            builder.build(&mut ctx)?;
        }
        info!(
            cluster = %cluster.name,
            task_count = self.tasks.len(),
            "📋 MODEL: Built task set"
        );
        Ok(())
    }

    pub fn add_task<T: DeltaTask>(&mut self, task: T) -> ConvergeResult<()> {
        ModelBuilderContext::new(&self.cluster, &mut self.tasks).add_task(task)
    }

    pub fn ensure_task<T: DeltaTask>(&mut self, task: T) -> bool {
        ModelBuilderContext::new(&self.cluster, &mut self.tasks).ensure_task(task)
    }

    pub fn cloud(&self) -> &CloudClients {
        &self.cloud
    }

    pub fn cluster(&self) -> &ClusterSpec {
        &self.cluster
    }

    pub fn tasks(&self) -> &TaskSet {
        &self.tasks
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn into_parts(self) -> (CloudClients, TaskSet, Target) {
        (self.cloud, self.tasks, self.target)
    }
}
