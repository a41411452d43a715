//! # Cloud Provider Capabilities
//!
//! The narrow set of provider calls the task kinds need, expressed as traits
//! so the engine can run against a real provider client or the in-memory
//! [`MemoryCloud`].
//!
//! ## Key Features
//!
//! - **Capability traits**: [`ComputeApi`], [`ContainerApi`] and
//!   [`OperationSource`] cover networks, managed clusters, node pools and
//!   operation status.
//! - **Injected clients**: a [`CloudClientFactory`] owned by the caller builds
//!   the [`CloudClients`] for one run; nothing is cached process-wide.
//! - **Operation polling**: [`OperationPoller`] waits for asynchronous
//!   mutations to reach a terminal state.

pub mod error;
pub mod memory;
pub mod operation;
pub mod poller;
pub mod utils;

pub use error::{found, CloudError, CloudResult};
pub use memory::MemoryCloud;
pub use operation::{Operation, OperationErrorDetail, OperationRef, OperationScope, OperationStatus};
pub use poller::OperationPoller;

use crate::error::ConvergeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub name: String,
    pub self_link: String,
    pub auto_create_subnetworks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub name: String,
    pub auto_create_subnetworks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    pub machine_type: String,
    pub disk_size_gb: i64,
    pub disk_type: Option<String>,
    pub image_type: Option<String>,
    pub tags: Vec<String>,
    pub oauth_scopes: Vec<String>,
    pub preemptible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodePoolInfo {
    pub name: String,
    pub initial_node_count: i64,
    pub config: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub name: String,
    pub zone: String,
    pub self_link: String,
    pub current_master_version: String,
    pub locations: Vec<String>,
    pub network: String,
    pub node_pools: Vec<NodePoolInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub name: String,
    pub network: Option<String>,
    pub initial_cluster_version: Option<String>,
    pub locations: Vec<String>,
    pub node_pools: Vec<NodePoolInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterUpdate {
    pub desired_master_version: Option<String>,
    pub desired_locations: Option<Vec<String>>,
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_network(&self, project: &str, name: &str) -> CloudResult<NetworkInfo>;

    async fn create_network(&self, project: &str, request: NetworkRequest) -> CloudResult<Operation>;
}

#[async_trait]
pub trait ContainerApi: Send + Sync {
    async fn get_cluster(&self, project: &str, zone: &str, name: &str) -> CloudResult<ClusterInfo>;

    async fn create_cluster(
        &self,
        project: &str,
        zone: &str,
        request: ClusterRequest,
    ) -> CloudResult<Operation>;

    async fn update_cluster(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        update: ClusterUpdate,
    ) -> CloudResult<Operation>;

    async fn get_node_pool(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        name: &str,
    ) -> CloudResult<NodePoolInfo>;

    async fn create_node_pool(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        pool: NodePoolInfo,
    ) -> CloudResult<Operation>;

    async fn set_node_pool_size(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        name: &str,
        node_count: i64,
    ) -> CloudResult<Operation>;
}

/// Fetches the current state of an operation.
#[async_trait]
pub trait OperationSource: Send + Sync {
    async fn get_operation(&self, operation: &OperationRef) -> CloudResult<Operation>;
}

/// Provider clients bound to one project and location.
#[derive(Clone)]
pub struct CloudClients {
    project: String,
    region: String,
    zone: String,
    compute: Arc<dyn ComputeApi>,
    container: Arc<dyn ContainerApi>,
    operations: Arc<dyn OperationSource>,
}

impl CloudClients {
    pub fn new(
        project: impl Into<String>,
        region: impl Into<String>,
        zone: impl Into<String>,
        compute: Arc<dyn ComputeApi>,
        container: Arc<dyn ContainerApi>,
        operations: Arc<dyn OperationSource>,
    ) -> Self {
        Self {
            project: project.into(),
            region: region.into(),
            zone: zone.into(),
            compute,
            container,
            operations,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub fn compute(&self) -> &dyn ComputeApi {
        self.compute.as_ref()
    }

    pub fn container(&self) -> &dyn ContainerApi {
        self.container.as_ref()
    }

    pub fn operations(&self) -> Arc<dyn OperationSource> {
        Arc::clone(&self.operations)
    }
}

impl fmt::Debug for CloudClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClients")
            .field("project", &self.project)
            .field("region", &self.region)
            .field("zone", &self.zone)
            .finish()
    }
}

/// Builds provider clients for a location. Owned by whoever starts a run.
pub trait CloudClientFactory: Send + Sync {
    fn clients(&self, project: &str, region: &str, zone: &str) -> ConvergeResult<CloudClients>;
}
