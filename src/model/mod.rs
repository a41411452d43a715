//! # Model Building
//!
//! Turns a [`ClusterSpec`] into the set of tasks one convergence run works
//! on. Each [`ModelBuilder`] owns one concern (networking, the cluster,
//! extra node pools) and inserts tasks through a [`ModelBuilderContext`].
//! Builders never read each other's tasks; every cross-task reference is a
//! [`LazyLink`](crate::task::LazyLink) resolved at run time, so the order
//! builders run in does not matter.

pub mod assets;
pub mod builders;
pub mod spec;

pub use assets::node_assets;
pub use builders::{
    default_builders, ContainerClusterModelBuilder, NetworkModelBuilder, NodePoolModelBuilder,
};
pub use spec::{AssetSources, ClusterSpec, InstanceGroupRole, InstanceGroupSpec, NetworkSpec};

use crate::error::{ConvergeError, ConvergeResult};
use crate::task::{DeltaTask, Task, TaskId, TaskNode};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tasks keyed by identity, kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct TaskSet {
    tasks: Vec<Arc<dyn Task>>,
    index: HashMap<TaskId, usize>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task whose identity must be new.
    pub fn add(&mut self, task: Arc<dyn Task>) -> ConvergeResult<()> {
        let id = task.id();
        if self.index.contains_key(&id) {
            return Err(ConvergeError::DuplicateTask { task: id });
        }
        self.index.insert(id, self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    /// Insert a task unless one with the same identity exists. Returns
    /// whether it was inserted.
    pub fn ensure(&mut self, task: Arc<dyn Task>) -> bool {
        let id = task.id();
        if self.index.contains_key(&id) {
            debug!(task = %id, "Task already present; keeping existing definition");
            return false;
        }
        self.index.insert(id, self.tasks.len());
        self.tasks.push(task);
        true
    }

    pub fn get(&self, id: &TaskId) -> Option<&Arc<dyn Task>> {
        self.index.get(id).map(|&idx| &self.tasks[idx])
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Task>> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// What a builder sees: the cluster description and the task set so far.
pub struct ModelBuilderContext<'a> {
    cluster: &'a ClusterSpec,
    tasks: &'a mut TaskSet,
}

impl<'a> ModelBuilderContext<'a> {
    pub fn new(cluster: &'a ClusterSpec, tasks: &'a mut TaskSet) -> Self {
        Self { cluster, tasks }
    }

    pub fn cluster(&self) -> &'a ClusterSpec {
        self.cluster
    }

    pub fn add_task<T: DeltaTask>(&mut self, task: T) -> ConvergeResult<()> {
        self.tasks.add(Arc::new(TaskNode::new(task)))
    }

    pub fn ensure_task<T: DeltaTask>(&mut self, task: T) -> bool {
        self.tasks.ensure(Arc::new(TaskNode::new(task)))
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains(id)
    }
}

/// Adds the tasks for one concern of the cluster.
pub trait ModelBuilder: Send + Sync {
    fn name(&self) -> &'static str;

    fn build(&self, ctx: &mut ModelBuilderContext<'_>) -> ConvergeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Network;

    #[test]
    fn test_add_rejects_duplicates() {
        let mut tasks = TaskSet::new();
        tasks.add(Arc::new(TaskNode::new(Network::new("main")))).unwrap();
        let err = tasks
            .add(Arc::new(TaskNode::new(Network::new("main"))))
            .unwrap_err();
        assert!(matches!(err, ConvergeError::DuplicateTask { .. }));
        assert_eq!(tasks.len(), 1);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let spec = ClusterSpec::new("k8s", "p", "us-central1-a", "1.9.7");
        let mut tasks = TaskSet::new();
        let mut ctx = ModelBuilderContext::new(&spec, &mut tasks);

        assert!(ctx.ensure_task(Network::new("main")));
        assert!(!ctx.ensure_task(Network::new("main")));
        assert!(ctx.contains(&TaskId::new("Network", "main")));
        assert_eq!(tasks.len(), 1);
    }
}
