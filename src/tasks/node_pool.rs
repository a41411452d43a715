//! Additional node pools of a managed cluster.

use super::cluster::ContainerCluster;
use crate::cloud::utils::safe_object_name;
use crate::cloud::{found, NodeConfig, NodePoolInfo};
use crate::error::{ConvergeError, ConvergeResult};
use crate::staging::InventoryAsset;
use crate::target::{ApiTarget, ConfigTarget};
use crate::task::{
    ensure_unchanged, require, updated, ChangeSet, DeltaTask, LazyLink, Lifecycle, Phase,
    RenderApi, RenderConfig, RunContext, TaskId, TaskOutputs,
};
use async_trait::async_trait;
use serde::Serialize;

const DEFAULT_DISK_SIZE_GB: i64 = 100;

/// An additional group of worker nodes attached to a [`ContainerCluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePool {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub cluster: LazyLink,
    pub zone: LazyLink,
    pub machine_type: Option<String>,
    pub boot_disk_size_gb: Option<i64>,
    pub image: Option<String>,
    pub tags: Vec<String>,
    pub initial_count: Option<i64>,
    pub preemptible: Option<bool>,
    pub assets: Vec<InventoryAsset>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodePoolChanges {
    pub initial_count: Option<i64>,
}

impl ChangeSet for NodePoolChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        match self.initial_count {
            Some(_) => vec!["initial_count"],
            None => Vec::new(),
        }
    }
}

impl NodePool {
    pub fn new(name: impl Into<String>, cluster_name: &str) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::Normal,
            cluster: LazyLink::to::<ContainerCluster>(cluster_name, "name"),
            zone: LazyLink::to::<ContainerCluster>(cluster_name, "zone"),
            machine_type: None,
            boot_disk_size_gb: None,
            image: None,
            tags: Vec::new(),
            initial_count: None,
            preemptible: None,
            assets: Vec::new(),
        }
    }

    pub fn cloud_name(&self) -> String {
        safe_object_name(&self.name)
    }

    fn pool_info(&self) -> ConvergeResult<NodePoolInfo> {
        let id = TaskId::of(self);
        Ok(NodePoolInfo {
            name: self.cloud_name(),
            initial_node_count: *require(&id, "initial_count", &self.initial_count)?,
            config: NodeConfig {
                machine_type: require(&id, "machine_type", &self.machine_type)?.clone(),
                disk_size_gb: self.boot_disk_size_gb.unwrap_or(DEFAULT_DISK_SIZE_GB),
                disk_type: None,
                image_type: self.image.clone(),
                tags: self.tags.clone(),
                oauth_scopes: Vec::new(),
                preemptible: self.preemptible.unwrap_or(false),
            },
        })
    }
}

#[async_trait]
impl DeltaTask for NodePool {
    const KIND: &'static str = "NodePool";

    type Changes = NodePoolChanges;

    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn phase(&self) -> Phase {
        Phase::Cluster
    }

    fn links(&self) -> Vec<LazyLink> {
        vec![self.cluster.clone(), self.zone.clone()]
    }

    fn assets(&self) -> Vec<InventoryAsset> {
        self.assets.clone()
    }

    fn outputs(&self) -> TaskOutputs {
        TaskOutputs::new().with("name", self.cloud_name())
    }

    async fn find(&self, ctx: &RunContext<'_>) -> ConvergeResult<Option<Self>> {
        let cloud = ctx.cloud();
        let cluster = ctx.resolve(&self.cluster)?;
        let zone = ctx.resolve(&self.zone)?;

        let info = found(
            cloud
                .container()
                .get_node_pool(cloud.project(), &zone, &cluster, &self.cloud_name())
                .await,
        )?;

        Ok(info.map(|info| NodePool {
            machine_type: Some(info.config.machine_type),
            boot_disk_size_gb: Some(info.config.disk_size_gb),
            image: info.config.image_type,
            tags: info.config.tags,
            initial_count: Some(info.initial_node_count),
            preemptible: Some(info.config.preemptible),
            ..self.clone()
        }))
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        changes: &mut NodePoolChanges,
    ) -> ConvergeResult<()> {
        let id = TaskId::of(desired);
        match actual {
            None => {
                if desired.name.is_empty() {
                    return Err(ConvergeError::RequiredField {
                        task: id,
                        field: "name",
                    });
                }
                require(&id, "machine_type", &desired.machine_type)?;
                require(&id, "initial_count", &desired.initial_count)?;
            }
            Some(actual) => {
                ensure_unchanged(&id, "machine_type", &actual.machine_type, &desired.machine_type)?;
                ensure_unchanged(
                    &id,
                    "boot_disk_size_gb",
                    &actual.boot_disk_size_gb,
                    &desired.boot_disk_size_gb,
                )?;
                ensure_unchanged(&id, "preemptible", &actual.preemptible, &desired.preemptible)?;
                changes.initial_count = updated(&actual.initial_count, &desired.initial_count);
            }
        }
        Ok(())
    }

    fn api_renderer(&self) -> Option<&dyn RenderApi<Self>> {
        Some(self)
    }

    fn config_renderer(&self) -> Option<&dyn RenderConfig<Self>> {
        Some(self)
    }
}

#[async_trait]
impl RenderApi<NodePool> for NodePool {
    async fn render_api(
        &self,
        target: &ApiTarget,
        ctx: &RunContext<'_>,
        actual: Option<&NodePool>,
        changes: &NodePoolChanges,
    ) -> ConvergeResult<()> {
        let cloud = target.cloud();
        let cluster = ctx.resolve(&self.cluster)?;
        let zone = ctx.resolve(&self.zone)?;

        let operation = match (actual, changes.initial_count) {
            (None, _) => {
                cloud
                    .container()
                    .create_node_pool(cloud.project(), &zone, &cluster, self.pool_info()?)
                    .await?
            }
            (Some(_), Some(count)) => {
                cloud
                    .container()
                    .set_node_pool_size(cloud.project(), &zone, &cluster, &self.cloud_name(), count)
                    .await?
            }
            (Some(_), None) => return Ok(()),
        };
        target.wait_for(operation).await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct TerraformNodePool {
    name: String,
    cluster: String,
    zone: String,
    initial_node_count: i64,
    node_config: TerraformPoolNodeConfig,
}

#[derive(Serialize)]
struct TerraformPoolNodeConfig {
    machine_type: String,
    disk_size_gb: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    preemptible: bool,
}

impl RenderConfig<NodePool> for NodePool {
    fn render_config(
        &self,
        target: &ConfigTarget,
        _ctx: &RunContext<'_>,
        _actual: Option<&NodePool>,
        _changes: &NodePoolChanges,
    ) -> ConvergeResult<()> {
        let pool = self.pool_info()?;
        let body = TerraformNodePool {
            name: pool.name.clone(),
            cluster: target.reference(&self.cluster)?,
            zone: target.reference(&self.zone)?,
            initial_node_count: pool.initial_node_count,
            node_config: TerraformPoolNodeConfig {
                machine_type: pool.config.machine_type,
                disk_size_gb: pool.config.disk_size_gb,
                image_type: pool.config.image_type,
                tags: pool.config.tags,
                preemptible: pool.config.preemptible,
            },
        };
        target.render_resource(&TaskId::of(self), "google_container_node_pool", &pool.name, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> NodePool {
        let mut pool = NodePool::new("nodes-b", "k8s.example.com");
        pool.machine_type = Some("n1-standard-4".to_string());
        pool.initial_count = Some(2);
        pool
    }

    #[test]
    fn test_links_point_at_cluster() {
        let links = pool().links();
        assert_eq!(links.len(), 2);
        assert!(links
            .iter()
            .all(|link| link.target() == &TaskId::new("ContainerCluster", "k8s.example.com")));
        assert_eq!(links[1].attribute(), "zone");
    }

    #[test]
    fn test_resize_is_a_change() {
        let actual = pool();
        let mut desired = pool();
        desired.initial_count = Some(5);

        let mut changes = NodePoolChanges::default();
        NodePool::check_changes(Some(&actual), &desired, &mut changes).unwrap();
        assert_eq!(changes.initial_count, Some(5));
    }

    #[test]
    fn test_machine_type_is_immutable() {
        let actual = pool();
        let mut desired = pool();
        desired.machine_type = Some("n1-highmem-8".to_string());

        let err =
            NodePool::check_changes(Some(&actual), &desired, &mut Default::default()).unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::ImmutableFieldChanged {
                field: "machine_type",
                ..
            }
        ));
    }

    #[test]
    fn test_creation_requires_initial_count() {
        let mut desired = pool();
        desired.initial_count = None;
        let err = NodePool::check_changes(None, &desired, &mut Default::default()).unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::RequiredField {
                field: "initial_count",
                ..
            }
        ));
    }
}
