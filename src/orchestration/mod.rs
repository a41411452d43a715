//! # Orchestration
//!
//! Orders and executes a task set.
//!
//! ## Core Components
//!
//! - **TaskGraph**: dependency graph built from task links; produces the
//!   execution schedule and rejects cycles before anything runs
//! - **ConvergenceEngine**: runs the schedule against the active target in
//!   apply or dry-run mode, stopping at the first failure
//! - **ApplyCluster**: wires configuration, provider clients and model
//!   builders into a run, and stages a dry run's inventory
//! - **types**: run options, per-task outcomes and the run report

pub mod apply;
pub mod engine;
pub mod graph;
pub mod types;

pub use apply::ApplyCluster;
pub use engine::ConvergenceEngine;
pub use graph::{verify_target, ScheduledTask, TaskGraph};
pub use types::{
    PlannedAction, PlannedChange, RunMode, RunOptions, RunReport, TaskOutcome, TaskResult,
    TaskRun,
};
