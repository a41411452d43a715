//! Built-in model builders for networking, the cluster and its node pools.

use super::assets::node_assets;
use super::spec::InstanceGroupSpec;
use super::{ModelBuilder, ModelBuilderContext};
use crate::error::{ConvergeError, ConvergeResult};
use crate::task::Lifecycle;
use crate::tasks::{ContainerCluster, Network, NodePool};
use std::sync::Arc;

/// The builders a full cluster needs.
pub fn default_builders() -> Vec<Arc<dyn ModelBuilder>> {
    vec![
        Arc::new(NetworkModelBuilder),
        Arc::new(ContainerClusterModelBuilder),
        Arc::new(NodePoolModelBuilder),
    ]
}

pub struct NetworkModelBuilder;

impl ModelBuilder for NetworkModelBuilder {
    fn name(&self) -> &'static str {
        "network"
    }

    fn build(&self, ctx: &mut ModelBuilderContext<'_>) -> ConvergeResult<()> {
        let spec = ctx.cluster();
        let lifecycle = if spec.network.shared {
            Lifecycle::Shared
        } else {
            Lifecycle::Normal
        };
        let mut network = Network::new(spec.network_name()).with_lifecycle(lifecycle);
        network.auto_create_subnetworks = Some(spec.network.auto_create_subnetworks);
        ctx.ensure_task(network);
        Ok(())
    }
}

/// The cluster itself. The first node group becomes its default pool.
pub struct ContainerClusterModelBuilder;

impl ModelBuilder for ContainerClusterModelBuilder {
    fn name(&self) -> &'static str {
        "container-cluster"
    }

    fn build(&self, ctx: &mut ModelBuilderContext<'_>) -> ConvergeResult<()> {
        let spec = ctx.cluster();
        let default_group = spec.node_groups().next().ok_or_else(|| {
            ConvergeError::InvalidModel {
                reason: format!("cluster {} has no node instance group", spec.name),
            }
        })?;

        let mut cluster = ContainerCluster::new(&spec.name).with_network(spec.network_name());
        cluster.region = Some(spec.region());
        cluster.zone = Some(spec.zone.clone());
        cluster.version = Some(spec.kubernetes_version.clone());
        cluster.locations = Some(spec.additional_zones.clone());
        cluster.default_node_pool_name = Some(default_group.name.clone());
        cluster.machine_type = Some(default_group.machine_type.clone());
        cluster.initial_count = Some(default_group.min_size);
        cluster.boot_disk_size_gb = Some(default_group.root_volume_size());
        cluster.boot_disk_image = default_group.image.clone();
        cluster.tags = default_group.tags.clone();
        cluster.assets = node_assets(&spec.assets, &spec.kubernetes_version);

        ctx.add_task(cluster)
    }
}

/// One pool per node group after the default one.
pub struct NodePoolModelBuilder;

impl NodePoolModelBuilder {
    fn pool(cluster_name: &str, group: &InstanceGroupSpec) -> NodePool {
        let mut pool = NodePool::new(&group.name, cluster_name);
        pool.machine_type = Some(group.machine_type.clone());
        pool.boot_disk_size_gb = Some(group.root_volume_size());
        pool.image = group.image.clone();
        pool.tags = group.tags.clone();
        pool.initial_count = Some(group.min_size);
        pool.preemptible = Some(group.preemptible);
        pool
    }
}

impl ModelBuilder for NodePoolModelBuilder {
    fn name(&self) -> &'static str {
        "node-pool"
    }

    fn build(&self, ctx: &mut ModelBuilderContext<'_>) -> ConvergeResult<()> {
        let spec = ctx.cluster();
        let assets = node_assets(&spec.assets, &spec.kubernetes_version);
        let pools: Vec<NodePool> = spec
            .node_groups()
            .skip(1)
            .map(|group| {
                let mut pool = Self::pool(&spec.name, group);
                pool.assets = assets.clone();
                pool
            })
            .collect();

        for pool in pools {
            ctx.ensure_task(pool);
        }
        Ok(())
    }
}
