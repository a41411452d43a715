//! # Task Model
//!
//! A task describes one desired cloud resource and knows how to converge it.
//!
//! ## Architecture
//!
//! - [`DeltaTask`] is the typed contract a resource kind implements: `find`
//!   the live resource, `check_changes` between actual and desired, and
//!   optionally render through one or both targets.
//! - [`RenderApi`] / [`RenderConfig`] are the per-target capabilities. A kind
//!   that cannot render to a target simply does not return a renderer, which
//!   the engine detects before executing anything.
//! - [`Task`] is the object-safe view the engine schedules. Every `DeltaTask`
//!   is wrapped into one when it is added to the model, and its `run` is the
//!   shared delta algorithm in [`delta`].
//!
//! Tasks reference each other only through [`LazyLink`]s, never through
//! owning pointers, so the model is a plain set of values keyed by
//! [`TaskId`].

pub mod delta;
pub mod lifecycle;
pub mod link;
pub mod phase;

pub use delta::{ensure_unchanged, require, updated, TaskNode};
pub use lifecycle::Lifecycle;
pub use link::{LazyLink, OutputArena, TaskOutputs};
pub use phase::Phase;

use crate::cloud::CloudClients;
use crate::error::ConvergeResult;
use crate::orchestration::types::{RunMode, TaskRun};
use crate::staging::InventoryAsset;
use crate::target::{ApiTarget, ConfigTarget, Target, TargetKind};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Stable identity of a task: its kind plus its name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId {
    kind: &'static str,
    name: String,
}

impl TaskId {
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn of<T: DeltaTask>(task: &T) -> Self {
        Self::new(T::KIND, task.name())
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// The set of fields whose desired value differs from the live one.
pub trait ChangeSet: Default + fmt::Debug + Send + Sync {
    fn changed_fields(&self) -> Vec<&'static str>;

    fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }
}

/// Change set for kinds with no mutable fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoChanges;

impl ChangeSet for NoChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

/// Everything a task can see while it runs.
pub struct RunContext<'a> {
    cloud: &'a CloudClients,
    target: &'a Target,
    outputs: &'a OutputArena,
    mode: RunMode,
    lifecycle: Lifecycle,
}

impl<'a> RunContext<'a> {
    pub fn new(
        cloud: &'a CloudClients,
        target: &'a Target,
        outputs: &'a OutputArena,
        mode: RunMode,
        lifecycle: Lifecycle,
    ) -> Self {
        Self {
            cloud,
            target,
            outputs,
            mode,
            lifecycle,
        }
    }

    pub fn cloud(&self) -> &CloudClients {
        self.cloud
    }

    pub fn target(&self) -> &Target {
        self.target
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Effective lifecycle for this execution; phase filtering may demote it.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Value of a link whose referent has already run.
    pub fn resolve(&self, link: &LazyLink) -> ConvergeResult<String> {
        self.outputs.resolve(link).map(str::to_string)
    }
}

/// Typed contract implemented by each resource kind.
#[async_trait]
pub trait DeltaTask: Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: &'static str;

    type Changes: ChangeSet;

    fn name(&self) -> &str;

    fn lifecycle(&self) -> Lifecycle;

    fn phase(&self) -> Phase;

    /// Attributes of other tasks this one consumes; each is a graph edge.
    fn links(&self) -> Vec<LazyLink> {
        Vec::new()
    }

    /// Artifacts that must be reachable for this resource to work.
    fn assets(&self) -> Vec<InventoryAsset> {
        Vec::new()
    }

    /// Attributes published to dependents after this task has run.
    fn outputs(&self) -> TaskOutputs;

    /// Observe the live resource. Absence is `Ok(None)`, not an error.
    async fn find(&self, ctx: &RunContext<'_>) -> ConvergeResult<Option<Self>>;

    /// Record every field that must change. Fails on missing required fields
    /// for creation and on attempts to change immutable fields.
    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        changes: &mut Self::Changes,
    ) -> ConvergeResult<()>;

    fn api_renderer(&self) -> Option<&dyn RenderApi<Self>> {
        None
    }

    fn config_renderer(&self) -> Option<&dyn RenderConfig<Self>> {
        None
    }
}

/// Apply a change directly against provider APIs.
#[async_trait]
pub trait RenderApi<T: DeltaTask>: Send + Sync {
    async fn render_api(
        &self,
        target: &ApiTarget,
        ctx: &RunContext<'_>,
        actual: Option<&T>,
        changes: &T::Changes,
    ) -> ConvergeResult<()>;
}

/// Describe the resource in the declarative configuration artifact.
pub trait RenderConfig<T: DeltaTask>: Send + Sync {
    fn render_config(
        &self,
        target: &ConfigTarget,
        ctx: &RunContext<'_>,
        actual: Option<&T>,
        changes: &T::Changes,
    ) -> ConvergeResult<()>;
}

/// Object-safe task the engine schedules.
#[async_trait]
pub trait Task: fmt::Debug + Send + Sync {
    fn id(&self) -> TaskId;

    fn lifecycle(&self) -> Lifecycle;

    fn phase(&self) -> Phase;

    fn links(&self) -> Vec<LazyLink>;

    fn assets(&self) -> Vec<InventoryAsset>;

    fn supports(&self, target: TargetKind) -> bool;

    async fn run(&self, ctx: &RunContext<'_>) -> ConvergeResult<TaskRun>;
}
