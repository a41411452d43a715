//! # Convergence Engine
//!
//! Executes a [`Context`]'s task set against its target.
//!
//! ## Run sequence
//!
//! 1. Build the [`TaskGraph`] and compute the schedule. Unknown links,
//!    cycles and tasks that cannot render to the active target all fail here,
//!    before any task is discovered.
//! 2. Run tasks one at a time in schedule order. Each task's outputs are
//!    recorded so later tasks can resolve their links.
//! 3. Stop at the first failing task. Tasks already applied stay applied;
//!    running again with the same model picks up where this run stopped.
//! 4. Flush the target (apply mode only).
//!
//! Cancellation is checked before every task. A task that has started is
//! allowed to finish.

use super::graph::{verify_target, TaskGraph};
use super::types::{RunMode, RunOptions, RunReport, TaskResult};
use crate::constants::events;
use crate::context::Context;
use crate::error::{ConvergeError, ConvergeResult};
use crate::events::EventPublisher;
use crate::logging::{log_error, log_task_operation};
use crate::staging::InventoryAsset;
use crate::task::{OutputArena, RunContext};
use chrono::Utc;
use serde_json::json;
use std::collections::HashSet;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct ConvergenceEngine {
    publisher: Option<EventPublisher>,
    cancel: CancellationToken,
}

impl ConvergenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run(&self, context: Context, options: &RunOptions) -> ConvergeResult<RunReport> {
        let started_at = Utc::now();
        let (cloud, tasks, target) = context.into_parts();

        let graph = TaskGraph::build(&tasks)?;
        let schedule = graph.schedule(options.phases.as_ref())?;
        verify_target(&schedule, target.kind())?;

        info!(
            mode = ?options.mode,
            target = %target.kind(),
            scheduled = schedule.len(),
            total = graph.len(),
            "🚀 CONVERGE: Starting run"
        );
        self.publish(
            events::RUN_STARTED,
            json!({
                "mode": options.mode,
                "target": target.kind(),
                "tasks": schedule.iter().map(|s| s.id().to_string()).collect::<Vec<_>>(),
            }),
        );

        let mut arena = OutputArena::new();
        let mut results = Vec::with_capacity(schedule.len());
        let mut inventory = Vec::new();
        let mut seen_assets = HashSet::new();

        for scheduled in &schedule {
            let id = scheduled.id();

            if self.cancel.is_cancelled() {
                warn!(next_task = %id, completed = results.len(), "Run cancelled");
                self.publish(events::RUN_CANCELLED, json!({ "next_task": id }));
                return Err(ConvergeError::Cancelled);
            }

            self.publish(events::TASK_STARTED, json!({ "task": id }));
            let started = Instant::now();

            let run = {
                let ctx = RunContext::new(&cloud, &target, &arena, options.mode, scheduled.lifecycle);
                scheduled.task.run(&ctx).await
            };

            let run = match run {
                Ok(run) => run,
                Err(err) => {
                    log_task_operation("converge", &id.to_string(), "failed", Some(&err.to_string()));
                    log_error("engine", "run_task", &err.to_string(), Some(&id.to_string()));
                    self.publish(
                        events::TASK_FAILED,
                        json!({ "task": id, "error": err.to_string() }),
                    );
                    self.publish(events::RUN_FAILED, json!({ "task": id }));
                    return Err(ConvergeError::Task {
                        task: id,
                        source: Box::new(err),
                    });
                }
            };

            log_task_operation(
                "converge",
                &id.to_string(),
                &run.outcome.to_string(),
                None,
            );

            if options.mode == RunMode::DryRun {
                collect_assets(scheduled.task.assets(), &mut seen_assets, &mut inventory);
            }

            let result = TaskResult {
                task: id.clone(),
                outcome: run.outcome,
                duration: started.elapsed(),
                completed_at: Utc::now(),
            };
            self.publish_result(&result);
            arena.record(id, run.outputs);
            results.push(result);
        }

        let artifact = match options.mode {
            RunMode::Apply => target.finish().await?,
            RunMode::DryRun => None,
        };

        let report = RunReport {
            mode: options.mode,
            results,
            inventory,
            started_at,
            finished_at: Utc::now(),
        };

        if options.mode == RunMode::DryRun {
            for change in report.plan() {
                info!(task = %change.task, action = ?change.action, fields = ?change.fields, "Planned change");
            }
        }

        info!(
            mode = ?options.mode,
            tasks = report.results.len(),
            mutations = report.mutation_count(),
            assets = report.inventory.len(),
            artifact = ?artifact,
            "✅ CONVERGE: Run completed"
        );
        self.publish(
            events::RUN_COMPLETED,
            json!({
                "mode": options.mode,
                "tasks": report.results.len(),
                "mutations": report.mutation_count(),
            }),
        );

        Ok(report)
    }

    fn publish(&self, event: &str, context: serde_json::Value) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(event, context);
        }
    }

    fn publish_result(&self, result: &TaskResult) {
        if let Some(publisher) = &self.publisher {
            publisher.publish_payload(events::TASK_COMPLETED, result);
        }
    }
}

/// Append assets not already present, keeping first-seen order.
fn collect_assets(
    assets: Vec<InventoryAsset>,
    seen: &mut HashSet<InventoryAsset>,
    inventory: &mut Vec<InventoryAsset>,
) {
    for asset in assets {
        if seen.insert(asset.clone()) {
            inventory.push(asset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_assets_deduplicates() {
        let mut seen = HashSet::new();
        let mut inventory = Vec::new();
        collect_assets(
            vec![
                InventoryAsset::binary("https://x/kubelet"),
                InventoryAsset::container("k8s.gcr.io/pause-amd64:3.0"),
            ],
            &mut seen,
            &mut inventory,
        );
        collect_assets(
            vec![
                InventoryAsset::container("k8s.gcr.io/pause-amd64:3.0"),
                InventoryAsset::binary("https://x/kubectl"),
            ],
            &mut seen,
            &mut inventory,
        );

        let data: Vec<&str> = inventory.iter().map(|a| a.data.as_str()).collect();
        assert_eq!(
            data,
            vec![
                "https://x/kubelet",
                "k8s.gcr.io/pause-amd64:3.0",
                "https://x/kubectl"
            ]
        );
    }
}
