//! # Orchestration Types
//!
//! Run modes, per-task outcomes and the report a convergence run returns.

use crate::staging::InventoryAsset;
use crate::task::{Phase, TaskId, TaskOutputs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Render every needed change.
    #[default]
    Apply,
    /// Discover and compare only.
    DryRun,
}

/// Per-run execution options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Only visit tasks in these phases (plus whatever they link to).
    pub phases: Option<HashSet<Phase>>,
}

impl RunOptions {
    pub fn apply() -> Self {
        Self::default()
    }

    pub fn dry_run() -> Self {
        Self {
            mode: RunMode::DryRun,
            phases: None,
        }
    }

    pub fn with_phases(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        let phases: HashSet<Phase> = phases.into_iter().collect();
        self.phases = if phases.is_empty() { None } else { Some(phases) };
        self
    }
}

/// What happened to a single task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Resource did not exist and was rendered.
    Created,
    /// Resource existed and the listed fields were rendered.
    Updated { fields: Vec<String> },
    /// Resource exists and matches the desired state.
    Unchanged,
    /// Existing resource adopted without mutation.
    Bound,
    /// Task lifecycle is `Ignore`.
    Ignored,
    /// Dry run: would be created.
    WouldCreate,
    /// Dry run: would be updated.
    WouldUpdate { fields: Vec<String> },
}

impl TaskOutcome {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Created | Self::Updated { .. })
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated { fields } => write!(f, "updated ({})", fields.join(", ")),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Bound => write!(f, "bound"),
            Self::Ignored => write!(f, "ignored"),
            Self::WouldCreate => write!(f, "would create"),
            Self::WouldUpdate { fields } => write!(f, "would update ({})", fields.join(", ")),
        }
    }
}

/// Value returned by [`crate::task::Task::run`]
#[derive(Debug, Clone)]
pub struct TaskRun {
    pub outcome: TaskOutcome,
    pub outputs: TaskOutputs,
}

impl TaskRun {
    pub fn new(outcome: TaskOutcome, outputs: TaskOutputs) -> Self {
        Self { outcome, outputs }
    }
}

/// Result of one task within a run
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult {
    pub task: TaskId,
    pub outcome: TaskOutcome,
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    Create,
    Update,
    Bind,
    None,
}

/// A dry-run decision for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedChange {
    pub task: TaskId,
    pub action: PlannedAction,
    pub fields: Vec<String>,
}

/// Everything a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub results: Vec<TaskResult>,
    /// Artifacts the visited tasks need; filled for dry runs.
    pub inventory: Vec<InventoryAsset>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Task ids in the order they were executed.
    pub fn execution_order(&self) -> Vec<&TaskId> {
        self.results.iter().map(|result| &result.task).collect()
    }

    pub fn outcome(&self, task: &TaskId) -> Option<&TaskOutcome> {
        self.results
            .iter()
            .find(|result| &result.task == task)
            .map(|result| &result.outcome)
    }

    pub fn mutation_count(&self) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome.is_mutation())
            .count()
    }

    pub fn plan(&self) -> Vec<PlannedChange> {
        self.results
            .iter()
            .map(|result| {
                let (action, fields) = match &result.outcome {
                    TaskOutcome::Created | TaskOutcome::WouldCreate => {
                        (PlannedAction::Create, Vec::new())
                    }
                    TaskOutcome::Updated { fields } | TaskOutcome::WouldUpdate { fields } => {
                        (PlannedAction::Update, fields.clone())
                    }
                    TaskOutcome::Bound => (PlannedAction::Bind, Vec::new()),
                    TaskOutcome::Unchanged | TaskOutcome::Ignored => {
                        (PlannedAction::None, Vec::new())
                    }
                };
                PlannedChange {
                    task: result.task.clone(),
                    action,
                    fields,
                }
            })
            .collect()
    }
}
