//! The shared discover / compare / render algorithm.

use super::{ChangeSet, DeltaTask, Lifecycle, LazyLink, Phase, RunContext, Task, TaskId};
use crate::error::{ConvergeError, ConvergeResult};
use crate::orchestration::types::{RunMode, TaskOutcome, TaskRun};
use crate::staging::InventoryAsset;
use crate::target::{Target, TargetKind};
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{debug, info};

/// Type-erased holder for a desired `DeltaTask` value.
#[derive(Debug)]
pub struct TaskNode<T: DeltaTask> {
    desired: T,
}

impl<T: DeltaTask> TaskNode<T> {
    pub fn new(desired: T) -> Self {
        Self { desired }
    }

    pub fn desired(&self) -> &T {
        &self.desired
    }
}

#[async_trait]
impl<T: DeltaTask> Task for TaskNode<T> {
    fn id(&self) -> TaskId {
        TaskId::of(&self.desired)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.desired.lifecycle()
    }

    fn phase(&self) -> Phase {
        self.desired.phase()
    }

    fn links(&self) -> Vec<LazyLink> {
        self.desired.links()
    }

    fn assets(&self) -> Vec<InventoryAsset> {
        self.desired.assets()
    }

    fn supports(&self, target: TargetKind) -> bool {
        match target {
            TargetKind::Api => self.desired.api_renderer().is_some(),
            TargetKind::Config => self.desired.config_renderer().is_some(),
        }
    }

    async fn run(&self, ctx: &RunContext<'_>) -> ConvergeResult<TaskRun> {
        run_delta(&self.desired, ctx).await
    }
}

/// Converge one task.
///
/// Rendering happens at most once, and never when the resource exists and no
/// field differs (API target), when the lifecycle forbids mutation, or in a
/// dry run.
pub async fn run_delta<T: DeltaTask>(desired: &T, ctx: &RunContext<'_>) -> ConvergeResult<TaskRun> {
    let id = TaskId::of(desired);
    let lifecycle = ctx.lifecycle();

    if lifecycle == Lifecycle::Ignore {
        debug!(task = %id, "Ignoring task");
        let outputs = desired.outputs();
        ctx.target().bind(&id, &outputs);
        return Ok(TaskRun::new(TaskOutcome::Ignored, outputs));
    }

    let actual = desired.find(ctx).await?;

    match (&actual, lifecycle) {
        (None, Lifecycle::Shared) => {
            return Err(ConvergeError::SharedResourceMissing { task: id });
        }
        (Some(existing), Lifecycle::Shared | Lifecycle::ExistingOrCreate) => {
            debug!(task = %id, lifecycle = %lifecycle, "Bound to existing resource");
            let outputs = existing.outputs();
            ctx.target().bind(&id, &outputs);
            return Ok(TaskRun::new(TaskOutcome::Bound, outputs));
        }
        _ => {}
    }

    let mut changes = T::Changes::default();
    T::check_changes(actual.as_ref(), desired, &mut changes)?;
    let fields: Vec<String> = changes
        .changed_fields()
        .into_iter()
        .map(str::to_string)
        .collect();

    let outputs = match &actual {
        Some(existing) => existing.outputs().merged(desired.outputs()),
        None => desired.outputs(),
    };

    if ctx.mode() == RunMode::DryRun {
        let outcome = match (&actual, fields.is_empty()) {
            (None, _) => TaskOutcome::WouldCreate,
            (Some(_), true) => TaskOutcome::Unchanged,
            (Some(_), false) => TaskOutcome::WouldUpdate { fields },
        };
        return Ok(TaskRun::new(outcome, outputs));
    }

    match ctx.target() {
        Target::Api(api) => {
            if actual.is_some() && changes.is_empty() {
                debug!(task = %id, "No changes");
                return Ok(TaskRun::new(TaskOutcome::Unchanged, outputs));
            }
            let renderer = desired
                .api_renderer()
                .ok_or_else(|| unsupported(&id, TargetKind::Api))?;
            info!(task = %id, changes = ?fields, creating = actual.is_none(), "Rendering through API");
            renderer
                .render_api(api, ctx, actual.as_ref(), &changes)
                .await?;
        }
        Target::Config(config) => {
            let renderer = desired
                .config_renderer()
                .ok_or_else(|| unsupported(&id, TargetKind::Config))?;
            renderer.render_config(config, ctx, actual.as_ref(), &changes)?;
        }
    }

    let outcome = match (&actual, fields.is_empty()) {
        (None, _) => TaskOutcome::Created,
        (Some(_), true) => TaskOutcome::Unchanged,
        (Some(_), false) => TaskOutcome::Updated { fields },
    };
    Ok(TaskRun::new(outcome, outputs))
}

fn unsupported(task: &TaskId, target: TargetKind) -> ConvergeError {
    ConvergeError::UnsupportedTarget {
        task: task.clone(),
        target,
    }
}

/// Fails when a field needed for creation has no value.
pub fn require<'a, V>(
    task: &TaskId,
    field: &'static str,
    value: &'a Option<V>,
) -> ConvergeResult<&'a V> {
    match value {
        Some(value) => Ok(value),
        None => Err(ConvergeError::RequiredField {
            task: task.clone(),
            field,
        }),
    }
}

/// Fails when both sides specify a value and they differ.
pub fn ensure_unchanged<V: PartialEq + Debug>(
    task: &TaskId,
    field: &'static str,
    actual: &Option<V>,
    desired: &Option<V>,
) -> ConvergeResult<()> {
    match (actual, desired) {
        (Some(actual), Some(desired)) if actual != desired => {
            Err(ConvergeError::ImmutableFieldChanged {
                task: task.clone(),
                field,
                actual: format!("{actual:?}"),
                desired: format!("{desired:?}"),
            })
        }
        _ => Ok(()),
    }
}

/// The desired value when it is specified and differs from the actual one.
pub fn updated<V: PartialEq + Clone>(actual: &Option<V>, desired: &Option<V>) -> Option<V> {
    match desired {
        Some(value) if actual.as_ref() != Some(value) => Some(value.clone()),
        _ => None,
    }
}
