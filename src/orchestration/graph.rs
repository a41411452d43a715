//! # Task Graph
//!
//! Dependency graph over a [`TaskSet`]. Every [`LazyLink`] becomes an edge
//! from the referent to the referrer, so a topological order runs each task
//! after everything it reads from.
//!
//! Ordering uses Kahn's algorithm with ties broken by insertion order, which
//! keeps runs reproducible for the same model. When no order exists the
//! strongly connected components are reported as the cycle.

use crate::error::{ConvergeError, ConvergeResult};
use crate::model::TaskSet;
use crate::target::TargetKind;
use crate::task::{LazyLink, Lifecycle, Phase, Task, TaskId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// A task as it will be executed in this run.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Arc<dyn Task>,
    /// Declared lifecycle, or `Shared` for a referent pulled in from outside
    /// the selected phases.
    pub lifecycle: Lifecycle,
}

impl ScheduledTask {
    pub fn id(&self) -> TaskId {
        self.task.id()
    }
}

#[derive(Debug)]
pub struct TaskGraph {
    graph: DiGraph<Arc<dyn Task>, LazyLink>,
    index: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    /// Fails when a link names a task that is not in the set.
    pub fn build(tasks: &TaskSet) -> ConvergeResult<Self> {
        let mut graph = DiGraph::with_capacity(tasks.len(), tasks.len());
        let mut index = HashMap::with_capacity(tasks.len());

        for task in tasks.iter() {
            let node = graph.add_node(Arc::clone(task));
            index.insert(task.id(), node);
        }

        for task in tasks.iter() {
            let referrer = task.id();
            let to = index[&referrer];
            for link in task.links() {
                let from = *index.get(link.target()).ok_or_else(|| ConvergeError::UnknownLink {
                    from: referrer.clone(),
                    to: link.target().clone(),
                })?;
                graph.update_edge(from, to, link);
            }
        }

        debug!(
            tasks = graph.node_count(),
            links = graph.edge_count(),
            "Built task graph"
        );
        Ok(Self { graph, index })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every task in dependency order.
    pub fn toposort(&self) -> ConvergeResult<Vec<NodeIndex>> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|node| (node, 0))
            .collect();
        for edge in self.graph.edge_references() {
            *in_degree.entry(edge.target()).or_insert(0) += 1;
        }

        // Node indices follow insertion order.
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|node| in_degree[node] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.graph.node_count());

        while let Some(node) = queue.pop_front() {
            order.push(node);

            let mut dependents: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect();
            dependents.sort();
            dependents.dedup();

            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.graph.node_count() {
            return Err(ConvergeError::CycleDetected {
                cycle: self.cycle_members(),
            });
        }
        Ok(order)
    }

    /// Members of every strongly connected component that forms a cycle.
    fn cycle_members(&self) -> Vec<TaskId> {
        let mut members: Vec<TaskId> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || self
                        .graph
                        .find_edge(component[0], component[0])
                        .is_some()
            })
            .flatten()
            .map(|node| self.graph[node].id())
            .collect();
        members.sort();
        members
    }

    /// The tasks to execute, in order.
    ///
    /// With no phase filter every task runs with its declared lifecycle.
    /// Otherwise the tasks in `phases` run, preceded by whatever they
    /// transitively link to; those referents are only discovered and bound
    /// (`Shared`) unless they are `Ignore`. The whole graph is ordered first,
    /// so a cycle anywhere is reported even if the filter would skip it.
    pub fn schedule(&self, phases: Option<&HashSet<Phase>>) -> ConvergeResult<Vec<ScheduledTask>> {
        let order = self.toposort()?;

        let Some(phases) = phases else {
            return Ok(order
                .into_iter()
                .map(|node| {
                    let task = Arc::clone(&self.graph[node]);
                    let lifecycle = task.lifecycle();
                    ScheduledTask { task, lifecycle }
                })
                .collect());
        };

        let selected: HashSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&node| phases.contains(&self.graph[node].phase()))
            .collect();
        let referents = self.referents_of(&selected);

        Ok(order
            .into_iter()
            .filter_map(|node| {
                let task = Arc::clone(&self.graph[node]);
                let declared = task.lifecycle();
                if selected.contains(&node) {
                    Some(ScheduledTask {
                        task,
                        lifecycle: declared,
                    })
                } else if referents.contains(&node) {
                    let lifecycle = match declared {
                        Lifecycle::Ignore => Lifecycle::Ignore,
                        _ => Lifecycle::Shared,
                    };
                    Some(ScheduledTask { task, lifecycle })
                } else {
                    None
                }
            })
            .collect())
    }

    /// Tasks reachable backwards along links from `roots`, excluding roots.
    fn referents_of(&self, roots: &HashSet<NodeIndex>) -> HashSet<NodeIndex> {
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeIndex> = roots.iter().copied().collect();
        while let Some(node) = stack.pop() {
            for referent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if !roots.contains(&referent) && seen.insert(referent) {
                    stack.push(referent);
                }
            }
        }
        seen
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }
}

/// Tasks that will render must be able to render to `target`.
pub fn verify_target(schedule: &[ScheduledTask], target: TargetKind) -> ConvergeResult<()> {
    match schedule
        .iter()
        .find(|scheduled| scheduled.lifecycle.may_render() && !scheduled.task.supports(target))
    {
        Some(scheduled) => Err(ConvergeError::UnsupportedTarget {
            task: scheduled.id(),
            target,
        }),
        None => Ok(()),
    }
}
