//! Managed Kubernetes cluster.

use super::network::Network;
use crate::cloud::utils::safe_object_name;
use crate::cloud::{found, ClusterInfo, ClusterRequest, ClusterUpdate, NodeConfig, NodePoolInfo};
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCluster {
    pub name: String,
    pub lifecycle: Lifecycle,
    pub region: Option<String>,
    pub zone: Option<String>,
    pub version: Option<String>,
    /// Additional zones the nodes are spread across.
    pub locations: Option<Vec<String>>,
    pub default_node_pool_name: Option<String>,
    pub boot_disk_image: Option<String>,
    pub boot_disk_size_gb: Option<i64>,
    pub boot_disk_type: Option<String>,
    pub scopes: Vec<String>,
    pub machine_type: Option<String>,
    pub tags: Vec<String>,
    pub initial_count: Option<i64>,
    pub network: Option<LazyLink>,
    pub assets: Vec<InventoryAsset>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ContainerClusterChanges {
    pub version: Option<String>,
    pub locations: Option<Vec<String>>,
}

impl ChangeSet for ContainerClusterChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.version.is_some() {
            fields.push("version");
        }
        if self.locations.is_some() {
            fields.push("locations");
        }
        fields
    }
}

impl ContainerCluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifecycle: Lifecycle::Normal,
            region: None,
            zone: None,
            version: None,
            locations: None,
            default_node_pool_name: None,
            boot_disk_image: None,
            boot_disk_size_gb: None,
            boot_disk_type: None,
            scopes: Vec::new(),
            machine_type: None,
            tags: Vec::new(),
            initial_count: None,
            network: None,
            assets: Vec::new(),
        }
    }

    /// Consume the `name` attribute of the given network.
    pub fn with_network(mut self, network_name: impl Into<String>) -> Self {
        self.network = Some(LazyLink::to::<Network>(network_name, "name"));
        self
    }

    pub fn cloud_name(&self) -> String {
        safe_object_name(&self.name)
    }

    fn observed(&self, info: ClusterInfo) -> Self {
        // The pool created with the cluster is listed first.
        let default_pool = info.node_pools.first();

        Self {
            name: self.name.clone(),
            lifecycle: self.lifecycle,
            region: self.region.clone(),
            zone: Some(info.zone),
            version: Some(info.current_master_version),
            locations: Some(info.locations),
            default_node_pool_name: default_pool.map(|pool| pool.name.clone()),
            boot_disk_image: default_pool.and_then(|pool| pool.config.image_type.clone()),
            boot_disk_size_gb: default_pool.map(|pool| pool.config.disk_size_gb),
            boot_disk_type: default_pool.and_then(|pool| pool.config.disk_type.clone()),
            scopes: default_pool
                .map(|pool| pool.config.oauth_scopes.clone())
                .unwrap_or_default(),
            machine_type: default_pool.map(|pool| pool.config.machine_type.clone()),
            tags: default_pool
                .map(|pool| pool.config.tags.clone())
                .unwrap_or_default(),
            initial_count: default_pool.map(|pool| pool.initial_node_count),
            network: self.network.clone(),
            assets: self.assets.clone(),
        }
    }

    fn default_pool(&self) -> ConvergeResult<NodePoolInfo> {
        let id = TaskId::of(self);
        Ok(NodePoolInfo {
            name: require(&id, "default_node_pool_name", &self.default_node_pool_name)?.clone(),
            initial_node_count: *require(&id, "initial_count", &self.initial_count)?,
            config: NodeConfig {
                machine_type: require(&id, "machine_type", &self.machine_type)?.clone(),
                disk_size_gb: self.boot_disk_size_gb.unwrap_or(DEFAULT_DISK_SIZE_GB),
                disk_type: self.boot_disk_type.clone(),
                image_type: self.boot_disk_image.clone(),
                tags: self.tags.clone(),
                oauth_scopes: self.scopes.clone(),
                preemptible: false,
            },
        })
    }

    fn zone_in<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.zone.as_deref().unwrap_or(fallback)
    }
}

#[async_trait]
impl DeltaTask for ContainerCluster {
    const KIND: &'static str = "ContainerCluster";

    type Changes = ContainerClusterChanges;

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
        self.network.iter().cloned().collect()
    }

    fn assets(&self) -> Vec<InventoryAsset> {
        self.assets.clone()
    }

    fn outputs(&self) -> TaskOutputs {
        TaskOutputs::new()
            .with("name", self.cloud_name())
            .with_optional("zone", self.zone.as_deref())
    }

    async fn find(&self, ctx: &RunContext<'_>) -> ConvergeResult<Option<Self>> {
        let cloud = ctx.cloud();
        let zone = self.zone_in(cloud.zone());
        let info = found(
            cloud
                .container()
                .get_cluster(cloud.project(), zone, &self.cloud_name())
                .await,
        )?;
        Ok(info.map(|info| self.observed(info)))
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        changes: &mut ContainerClusterChanges,
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
                require(&id, "zone", &desired.zone)?;
                require(&id, "machine_type", &desired.machine_type)?;
                require(&id, "initial_count", &desired.initial_count)?;
                require(&id, "default_node_pool_name", &desired.default_node_pool_name)?;
            }
            Some(actual) => {
                ensure_unchanged(&id, "zone", &actual.zone, &desired.zone)?;
                if let (None, Some(wanted)) =
                    (&actual.default_node_pool_name, &desired.default_node_pool_name)
                {
                    return Err(ConvergeError::ImmutableFieldChanged {
                        task: id,
                        field: "default_node_pool_name",
                        actual: "None".to_string(),
                        desired: format!("{wanted:?}"),
                    });
                }
                ensure_unchanged(
                    &id,
                    "default_node_pool_name",
                    &actual.default_node_pool_name,
                    &desired.default_node_pool_name,
                )?;
                ensure_unchanged(&id, "machine_type", &actual.machine_type, &desired.machine_type)?;
                ensure_unchanged(
                    &id,
                    "boot_disk_size_gb",
                    &actual.boot_disk_size_gb,
                    &desired.boot_disk_size_gb,
                )?;
                changes.version = updated(&actual.version, &desired.version);
                changes.locations = updated(&actual.locations, &desired.locations);
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
impl RenderApi<ContainerCluster> for ContainerCluster {
    async fn render_api(
        &self,
        target: &ApiTarget,
        ctx: &RunContext<'_>,
        actual: Option<&ContainerCluster>,
        changes: &ContainerClusterChanges,
    ) -> ConvergeResult<()> {
        let cloud = target.cloud();
        let zone = self.zone_in(cloud.zone());
        let name = self.cloud_name();

        if actual.is_none() {
            let network = match &self.network {
                Some(link) => Some(ctx.resolve(link)?),
                None => None,
            };
            let request = ClusterRequest {
                name,
                network,
                initial_cluster_version: self.version.clone(),
                locations: self.locations.clone().unwrap_or_default(),
                node_pools: vec![self.default_pool()?],
            };
            let operation = cloud
                .container()
                .create_cluster(cloud.project(), zone, request)
                .await?;
            target.wait_for(operation).await?;
            return Ok(());
        }

        // The provider accepts one kind of update per call.
        if let Some(version) = &changes.version {
            let update = ClusterUpdate {
                desired_master_version: Some(version.clone()),
                ..Default::default()
            };
            let operation = cloud
                .container()
                .update_cluster(cloud.project(), zone, &name, update)
                .await?;
            target.wait_for(operation).await?;
        }
        if let Some(locations) = &changes.locations {
            let update = ClusterUpdate {
                desired_locations: Some(locations.clone()),
                ..Default::default()
            };
            let operation = cloud
                .container()
                .update_cluster(cloud.project(), zone, &name, update)
                .await?;
            target.wait_for(operation).await?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct TerraformNodeConfig {
    machine_type: String,
    disk_size_gb: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    oauth_scopes: Vec<String>,
    preemptible: bool,
}

impl From<NodeConfig> for TerraformNodeConfig {
    fn from(config: NodeConfig) -> Self {
        Self {
            machine_type: config.machine_type,
            disk_size_gb: config.disk_size_gb,
            disk_type: config.disk_type,
            image_type: config.image_type,
            tags: config.tags,
            oauth_scopes: config.oauth_scopes,
            preemptible: config.preemptible,
        }
    }
}

#[derive(Serialize)]
struct TerraformNodePoolBlock {
    name: String,
    initial_node_count: i64,
    node_config: TerraformNodeConfig,
}

#[derive(Serialize)]
struct TerraformCluster {
    name: String,
    zone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_master_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additional_zones: Vec<String>,
    node_pool: Vec<TerraformNodePoolBlock>,
}

impl RenderConfig<ContainerCluster> for ContainerCluster {
    fn render_config(
        &self,
        target: &ConfigTarget,
        ctx: &RunContext<'_>,
        _actual: Option<&ContainerCluster>,
        _changes: &ContainerClusterChanges,
    ) -> ConvergeResult<()> {
        let name = self.cloud_name();
        let network = match &self.network {
            Some(link) => Some(target.reference(link)?),
            None => None,
        };
        let pool = self.default_pool()?;

        let body = TerraformCluster {
            name: name.clone(),
            zone: self.zone_in(ctx.cloud().zone()).to_string(),
            network,
            min_master_version: self.version.clone(),
            additional_zones: self.locations.clone().unwrap_or_default(),
            node_pool: vec![TerraformNodePoolBlock {
                name: pool.name,
                initial_node_count: pool.initial_node_count,
                node_config: pool.config.into(),
            }],
        };
        target.render_resource(&TaskId::of(self), "google_container_cluster", &name, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired() -> ContainerCluster {
        let mut cluster = ContainerCluster::new("k8s.example.com").with_network("main");
        cluster.zone = Some("us-central1-a".to_string());
        cluster.machine_type = Some("n1-standard-2".to_string());
        cluster.initial_count = Some(3);
        cluster.default_node_pool_name = Some("nodes".to_string());
        cluster.version = Some("1.9.7".to_string());
        cluster
    }

    #[test]
    fn test_creation_requirements() {
        let mut cluster = desired();
        cluster.machine_type = None;
        let err = ContainerCluster::check_changes(None, &cluster, &mut Default::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::RequiredField {
                field: "machine_type",
                ..
            }
        ));
        assert!(
            ContainerCluster::check_changes(None, &desired(), &mut Default::default()).is_ok()
        );
    }

    #[test]
    fn test_version_upgrade_is_a_change() {
        let actual = desired();
        let mut wanted = desired();
        wanted.version = Some("1.10.2".to_string());

        let mut changes = ContainerClusterChanges::default();
        ContainerCluster::check_changes(Some(&actual), &wanted, &mut changes).unwrap();
        assert_eq!(changes.version.as_deref(), Some("1.10.2"));
        assert_eq!(changes.changed_fields(), vec!["version"]);
    }

    #[test]
    fn test_zone_is_immutable() {
        let actual = desired();
        let mut wanted = desired();
        wanted.zone = Some("europe-west1-b".to_string());

        let err = ContainerCluster::check_changes(Some(&actual), &wanted, &mut Default::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::ImmutableFieldChanged { field: "zone", .. }
        ));
    }

    fn live(pools: Vec<NodePoolInfo>) -> ClusterInfo {
        ClusterInfo {
            name: "k8s-example-com".to_string(),
            zone: "us-central1-a".to_string(),
            self_link: String::new(),
            current_master_version: "1.9.7".to_string(),
            locations: Vec::new(),
            network: "main".to_string(),
            node_pools: pools,
        }
    }

    fn live_pool(name: &str, machine_type: &str) -> NodePoolInfo {
        NodePoolInfo {
            name: name.to_string(),
            initial_node_count: 3,
            config: NodeConfig {
                machine_type: machine_type.to_string(),
                disk_size_gb: DEFAULT_DISK_SIZE_GB,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_observes_first_pool_whatever_the_desired_name() {
        let mut wanted = desired();
        wanted.default_node_pool_name = Some("workers".to_string());
        let actual = wanted.observed(live(vec![
            live_pool("nodes", "n1-standard-2"),
            live_pool("workers", "n1-highmem-4"),
        ]));
        assert_eq!(actual.default_node_pool_name.as_deref(), Some("nodes"));
        assert_eq!(actual.machine_type.as_deref(), Some("n1-standard-2"));

        let err = ContainerCluster::check_changes(Some(&actual), &wanted, &mut Default::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::ImmutableFieldChanged {
                field: "default_node_pool_name",
                ..
            }
        ));
    }

    #[test]
    fn test_live_cluster_without_pools_is_rejected() {
        let wanted = desired();
        let actual = wanted.observed(live(Vec::new()));
        let err = ContainerCluster::check_changes(Some(&actual), &wanted, &mut Default::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::ImmutableFieldChanged {
                field: "default_node_pool_name",
                ..
            }
        ));
    }

    #[test]
    fn test_links_to_network() {
        let links = desired().links();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target(), &TaskId::new("Network", "main"));
        assert_eq!(desired().outputs().get("name"), Some("k8s-example-com"));
    }
}
