//! Declarative configuration output.
//!
//! Resources accumulate into a single JSON document of the form
//! `{"resource": {"<type>": {"<name>": {...}}}}`. A reference to a rendered
//! resource becomes an interpolation string (`${type.name.attribute}`); a
//! reference to a resource that was only bound resolves to its observed value.

use crate::constants::render::CONFIG_FILE_NAME;
use crate::error::{ConvergeError, ConvergeResult};
use crate::task::{LazyLink, TaskId, TaskOutputs};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Default)]
struct ConfigDocument {
    resources: BTreeMap<String, BTreeMap<String, Value>>,
    rendered: HashMap<TaskId, (String, String)>,
    bound: HashMap<TaskId, TaskOutputs>,
}

#[derive(Debug)]
pub struct ConfigTarget {
    output_dir: PathBuf,
    document: Mutex<ConfigDocument>,
}

impl ConfigTarget {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            document: Mutex::new(ConfigDocument::default()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Add `task`'s resource block. Each (type, name) pair may be emitted once.
    pub fn render_resource<B: Serialize>(
        &self,
        task: &TaskId,
        resource_type: &str,
        resource_name: &str,
        body: &B,
    ) -> ConvergeResult<()> {
        let body = serde_json::to_value(body)?;
        let mut document = self.document.lock();

        let blocks = document
            .resources
            .entry(resource_type.to_string())
            .or_default();
        if blocks.contains_key(resource_name) {
            return Err(ConvergeError::Render(format!(
                "{resource_type}.{resource_name} rendered twice (by {task})"
            )));
        }
        blocks.insert(resource_name.to_string(), body);
        document.rendered.insert(
            task.clone(),
            (resource_type.to_string(), resource_name.to_string()),
        );
        Ok(())
    }

    pub(crate) fn bind(&self, task: &TaskId, outputs: &TaskOutputs) {
        self.document.lock().bound.insert(task.clone(), outputs.clone());
    }

    /// The value to write wherever `link` is consumed.
    pub fn reference(&self, link: &LazyLink) -> ConvergeResult<String> {
        let document = self.document.lock();

        if let Some((resource_type, resource_name)) = document.rendered.get(link.target()) {
            return Ok(format!(
                "${{{resource_type}.{resource_name}.{}}}",
                link.attribute()
            ));
        }

        document
            .bound
            .get(link.target())
            .and_then(|outputs| outputs.get(link.attribute()))
            .map(str::to_string)
            .ok_or_else(|| ConvergeError::UnresolvedLink {
                task: link.target().clone(),
                attribute: link.attribute().to_string(),
            })
    }

    /// Snapshot of the document as it would be written.
    pub fn document(&self) -> Value {
        let document = self.document.lock();
        let resources: Map<String, Value> = document
            .resources
            .iter()
            .map(|(resource_type, blocks)| {
                let blocks: Map<String, Value> = blocks
                    .iter()
                    .map(|(name, body)| (name.clone(), body.clone()))
                    .collect();
                (resource_type.clone(), Value::Object(blocks))
            })
            .collect();
        json!({ "resource": resources })
    }

    pub(crate) async fn finish(&self) -> ConvergeResult<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(CONFIG_FILE_NAME);
        let contents = serde_json::to_string_pretty(&self.document())?;
        tokio::fs::write(&path, contents).await?;

        info!(path = %path.display(), "Wrote declarative configuration");
        Ok(path)
    }
}
