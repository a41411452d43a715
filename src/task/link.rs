//! Deferred references between tasks.
//!
//! A task that needs an attribute of another task (a network name, a cluster
//! zone) holds a [`LazyLink`] instead of the value. The link is an edge in the
//! task graph; its value is only read from the [`OutputArena`] after the
//! referent has run.

use super::{DeltaTask, TaskId};
use crate::error::{ConvergeError, ConvergeResult};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LazyLink {
    target: TaskId,
    attribute: &'static str,
}

impl LazyLink {
    pub fn new(target: TaskId, attribute: &'static str) -> Self {
        Self { target, attribute }
    }

    /// Link to `attribute` of the `T` task called `name`.
    pub fn to<T: DeltaTask>(name: impl Into<String>, attribute: &'static str) -> Self {
        Self::new(TaskId::new(T::KIND, name), attribute)
    }

    pub fn target(&self) -> &TaskId {
        &self.target
    }

    pub fn attribute(&self) -> &'static str {
        self.attribute
    }
}

impl fmt::Display for LazyLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.target, self.attribute)
    }
}

/// Attribute values a task publishes once it has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskOutputs(BTreeMap<String, String>);

impl TaskOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(attribute.into(), value.into());
        self
    }

    /// Adds the attribute only when a value is known.
    pub fn with_optional(self, attribute: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.with(attribute, value),
            None => self,
        }
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.0.get(attribute).map(String::as_str)
    }

    /// Values from `overrides` replace values already present.
    pub fn merged(mut self, overrides: TaskOutputs) -> Self {
        self.0.extend(overrides.0);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Outputs of every task that has completed in the current run.
#[derive(Debug, Default)]
pub struct OutputArena {
    outputs: HashMap<TaskId, TaskOutputs>,
}

impl OutputArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, task: TaskId, outputs: TaskOutputs) {
        self.outputs.insert(task, outputs);
    }

    pub fn contains(&self, task: &TaskId) -> bool {
        self.outputs.contains_key(task)
    }

    pub fn outputs(&self, task: &TaskId) -> Option<&TaskOutputs> {
        self.outputs.get(task)
    }

    /// Fails when the referent has not run or did not publish the attribute.
    pub fn resolve(&self, link: &LazyLink) -> ConvergeResult<&str> {
        self.outputs
            .get(link.target())
            .and_then(|outputs| outputs.get(link.attribute()))
            .ok_or_else(|| ConvergeError::UnresolvedLink {
                task: link.target().clone(),
                attribute: link.attribute().to_string(),
            })
    }
}
