//! # Convergence Errors
//!
//! Every failure the engine can surface to its caller. Sub-domains (cloud
//! providers, configuration, artifact transfer) carry their own error enums
//! and are folded into [`ConvergeError`] at the boundary.
//!
//! A missing resource is never an error here: `Find` returns `None` instead.

use crate::cloud::CloudError;
use crate::config::ConfigurationError;
use crate::staging::{AssetType, TransferError};
use crate::target::TargetKind;
use crate::task::TaskId;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvergeError {
    /// A field needed to create the resource was not specified.
    #[error("{task}: required field {field} is not set")]
    RequiredField { task: TaskId, field: &'static str },

    #[error("{task}: field {field} cannot be changed (actual {actual:?}, desired {desired:?})")]
    ImmutableFieldChanged {
        task: TaskId,
        field: &'static str,
        actual: String,
        desired: String,
    },

    #[error("{task}: shared resource was not found; it must exist before this cluster is converged")]
    SharedResourceMissing { task: TaskId },

    #[error("dependency cycle detected between tasks: {}", format_cycle(.cycle))]
    CycleDetected { cycle: Vec<TaskId> },

    #[error("operation {operation} failed with code {code}: {message}")]
    OperationFailed {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("timed out after {timeout:?} waiting for operation {operation}")]
    OperationTimedOut { operation: String, timeout: Duration },

    #[error("transfer failed for Type:{asset_type} Data:{data}: {source}")]
    TransferFailed {
        asset_type: AssetType,
        data: String,
        #[source]
        source: TransferError,
    },

    #[error("task {task} was added to the model twice")]
    DuplicateTask { task: TaskId },

    #[error("{from} links to {to}, which is not part of the model")]
    UnknownLink { from: TaskId, to: TaskId },

    #[error("attribute {attribute} of {task} is not available yet")]
    UnresolvedLink { task: TaskId, attribute: String },

    #[error("{task} cannot be rendered to the {target} target")]
    UnsupportedTarget { task: TaskId, target: TargetKind },

    #[error("cannot determine operation scope from self link {link}: {reason}")]
    InvalidSelfLink { link: String, reason: String },

    #[error("model error: {reason}")]
    InvalidModel { reason: String },

    #[error("convergence cancelled")]
    Cancelled,

    /// Wraps the first failure of a run with the identity of the failing task.
    #[error("{task}: {source}")]
    Task {
        task: TaskId,
        #[source]
        source: Box<ConvergeError>,
    },

    #[error(transparent)]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvergeError {
    /// The innermost error, past any task-context wrappers.
    pub fn root(&self) -> &ConvergeError {
        match self {
            ConvergeError::Task { source, .. } => source.root(),
            other => other,
        }
    }

    /// Identity of the task the error was reported against, if any.
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            ConvergeError::Task { task, .. }
            | ConvergeError::RequiredField { task, .. }
            | ConvergeError::ImmutableFieldChanged { task, .. }
            | ConvergeError::SharedResourceMissing { task }
            | ConvergeError::DuplicateTask { task }
            | ConvergeError::UnsupportedTarget { task, .. } => Some(task),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConvergeError {
    fn from(err: serde_json::Error) -> Self {
        ConvergeError::Render(err.to_string())
    }
}

fn format_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

pub type ConvergeResult<T> = Result<T, ConvergeError>;
