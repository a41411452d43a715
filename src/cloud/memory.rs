//! In-memory cloud provider.
//!
//! Resources become visible as soon as the mutating call returns; the
//! operation it hands back completes after a configurable number of status
//! fetches. Every mutating call is recorded so callers can assert that a
//! converged model causes no further changes.

use super::{
    CloudClientFactory, CloudClients, CloudError, CloudResult, ClusterInfo, ClusterRequest,
    ClusterUpdate, ComputeApi, ContainerApi, NetworkInfo, NetworkRequest, NodePoolInfo,
    Operation, OperationErrorDetail, OperationRef, OperationSource, OperationStatus,
};
use crate::error::ConvergeResult;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_MASTER_VERSION: &str = "1.9.7-gke.1";
const DEFAULT_NETWORK: &str = "default";

type ClusterKey = (String, String, String);

#[derive(Debug)]
struct PendingOperation {
    operation: Operation,
    remaining_polls: u32,
}

#[derive(Debug, Default)]
struct MemoryState {
    networks: DashMap<(String, String), NetworkInfo>,
    clusters: DashMap<ClusterKey, ClusterInfo>,
    operations: DashMap<String, PendingOperation>,
    mutations: Mutex<Vec<String>>,
    next_operation: AtomicU64,
    polls_per_operation: AtomicU32,
    operation_fetches: AtomicU32,
    injected_failure: Mutex<Option<OperationErrorDetail>>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCloud {
    state: Arc<MemoryState>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operations need this many status fetches before reporting `DONE`;
    /// zero means they come back already finished.
    pub fn with_polls_per_operation(self, polls: u32) -> Self {
        self.state.polls_per_operation.store(polls, Ordering::SeqCst);
        self
    }

    /// The next operation created finishes with this error.
    pub fn fail_next_operation(&self, code: &str, message: &str) {
        *self.state.injected_failure.lock() = Some(OperationErrorDetail {
            code: code.to_string(),
            message: message.to_string(),
        });
    }

    pub fn insert_network(&self, project: &str, network: NetworkInfo) {
        self.state
            .networks
            .insert((project.to_string(), network.name.clone()), network);
    }

    pub fn insert_cluster(&self, project: &str, cluster: ClusterInfo) {
        let key = (project.to_string(), cluster.zone.clone(), cluster.name.clone());
        self.state.clusters.insert(key, cluster);
    }

    pub fn network(&self, project: &str, name: &str) -> Option<NetworkInfo> {
        self.state
            .networks
            .get(&(project.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn cluster(&self, project: &str, zone: &str, name: &str) -> Option<ClusterInfo> {
        self.state
            .clusters
            .get(&cluster_key(project, zone, name))
            .map(|entry| entry.value().clone())
    }

    /// Descriptions of every mutating call, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.state.mutations.lock().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.mutations.lock().len()
    }

    pub fn operation_fetches(&self) -> u32 {
        self.state.operation_fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.state.mutations.lock().push(call);
    }

    fn start_operation(&self, self_link_base: String) -> Operation {
        let id = self.state.next_operation.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("operation-{id}");
        let mut operation = Operation::pending(name.clone(), format!("{self_link_base}/{name}"));

        let polls = self.state.polls_per_operation.load(Ordering::SeqCst);
        if polls == 0 {
            self.complete(&mut operation);
            return operation;
        }

        self.state.operations.insert(
            name,
            PendingOperation {
                operation: operation.clone(),
                remaining_polls: polls,
            },
        );
        operation
    }

    fn complete(&self, operation: &mut Operation) {
        operation.status = OperationStatus::Done;
        if let Some(failure) = self.state.injected_failure.lock().take() {
            operation.http_error_status_code = Some(400);
            operation.status_message = Some(failure.message.clone());
            operation.errors.push(failure);
        }
    }

    fn compute_operations(project: &str) -> String {
        format!("https://www.googleapis.com/compute/v1/projects/{project}/global/operations")
    }

    fn container_operations(project: &str, zone: &str) -> String {
        format!("https://container.googleapis.com/v1/projects/{project}/zones/{zone}/operations")
    }
}

fn cluster_key(project: &str, zone: &str, name: &str) -> ClusterKey {
    (project.to_string(), zone.to_string(), name.to_string())
}

fn conflict(resource: String) -> CloudError {
    CloudError::Api {
        code: 409,
        message: format!("{resource} already exists"),
    }
}

#[async_trait]
impl ComputeApi for MemoryCloud {
    async fn get_network(&self, project: &str, name: &str) -> CloudResult<NetworkInfo> {
        self.network(project, name)
            .ok_or_else(|| CloudError::not_found(format!("network {name}")))
    }

    async fn create_network(&self, project: &str, request: NetworkRequest) -> CloudResult<Operation> {
        if self.network(project, &request.name).is_some() {
            return Err(conflict(format!("network {}", request.name)));
        }
        self.record(format!("create_network {}", request.name));
        self.insert_network(
            project,
            NetworkInfo {
                self_link: format!(
                    "https://www.googleapis.com/compute/v1/projects/{project}/global/networks/{}",
                    request.name
                ),
                name: request.name,
                auto_create_subnetworks: request.auto_create_subnetworks,
            },
        );
        Ok(self.start_operation(Self::compute_operations(project)))
    }
}

#[async_trait]
impl ContainerApi for MemoryCloud {
    async fn get_cluster(&self, project: &str, zone: &str, name: &str) -> CloudResult<ClusterInfo> {
        self.cluster(project, zone, name)
            .ok_or_else(|| CloudError::not_found(format!("cluster {name}")))
    }

    async fn create_cluster(
        &self,
        project: &str,
        zone: &str,
        request: ClusterRequest,
    ) -> CloudResult<Operation> {
        if self.cluster(project, zone, &request.name).is_some() {
            return Err(conflict(format!("cluster {}", request.name)));
        }
        self.record(format!("create_cluster {}", request.name));
        self.insert_cluster(
            project,
            ClusterInfo {
                self_link: format!(
                    "https://container.googleapis.com/v1/projects/{project}/zones/{zone}/clusters/{}",
                    request.name
                ),
                zone: zone.to_string(),
                current_master_version: request
                    .initial_cluster_version
                    .unwrap_or_else(|| DEFAULT_MASTER_VERSION.to_string()),
                locations: request.locations,
                network: request
                    .network
                    .unwrap_or_else(|| DEFAULT_NETWORK.to_string()),
                node_pools: request.node_pools,
                name: request.name,
            },
        );
        Ok(self.start_operation(Self::container_operations(project, zone)))
    }

    async fn update_cluster(
        &self,
        project: &str,
        zone: &str,
        name: &str,
        update: ClusterUpdate,
    ) -> CloudResult<Operation> {
        {
            let mut cluster = self
                .state
                .clusters
                .get_mut(&cluster_key(project, zone, name))
                .ok_or_else(|| CloudError::not_found(format!("cluster {name}")))?;
            if let Some(version) = update.desired_master_version {
                cluster.current_master_version = version;
            }
            if let Some(locations) = update.desired_locations {
                cluster.locations = locations;
            }
        }
        self.record(format!("update_cluster {name}"));
        Ok(self.start_operation(Self::container_operations(project, zone)))
    }

    async fn get_node_pool(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        name: &str,
    ) -> CloudResult<NodePoolInfo> {
        self.cluster(project, zone, cluster)
            .ok_or_else(|| CloudError::not_found(format!("cluster {cluster}")))?
            .node_pools
            .into_iter()
            .find(|pool| pool.name == name)
            .ok_or_else(|| CloudError::not_found(format!("node pool {name}")))
    }

    async fn create_node_pool(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        pool: NodePoolInfo,
    ) -> CloudResult<Operation> {
        {
            let mut entry = self
                .state
                .clusters
                .get_mut(&cluster_key(project, zone, cluster))
                .ok_or_else(|| CloudError::not_found(format!("cluster {cluster}")))?;
            if entry.node_pools.iter().any(|existing| existing.name == pool.name) {
                return Err(conflict(format!("node pool {}", pool.name)));
            }
            entry.node_pools.push(pool.clone());
        }
        self.record(format!("create_node_pool {cluster}/{}", pool.name));
        Ok(self.start_operation(Self::container_operations(project, zone)))
    }

    async fn set_node_pool_size(
        &self,
        project: &str,
        zone: &str,
        cluster: &str,
        name: &str,
        node_count: i64,
    ) -> CloudResult<Operation> {
        {
            let mut entry = self
                .state
                .clusters
                .get_mut(&cluster_key(project, zone, cluster))
                .ok_or_else(|| CloudError::not_found(format!("cluster {cluster}")))?;
            let pool = entry
                .node_pools
                .iter_mut()
                .find(|pool| pool.name == name)
                .ok_or_else(|| CloudError::not_found(format!("node pool {name}")))?;
            pool.initial_node_count = node_count;
        }
        self.record(format!("set_node_pool_size {cluster}/{name} {node_count}"));
        Ok(self.start_operation(Self::container_operations(project, zone)))
    }
}

#[async_trait]
impl OperationSource for MemoryCloud {
    async fn get_operation(&self, operation: &OperationRef) -> CloudResult<Operation> {
        self.state.operation_fetches.fetch_add(1, Ordering::SeqCst);

        let finished = {
            let mut pending = self
                .state
                .operations
                .get_mut(&operation.name)
                .ok_or_else(|| CloudError::not_found(format!("operation {}", operation.name)))?;
            pending.remaining_polls = pending.remaining_polls.saturating_sub(1);
            if pending.remaining_polls > 0 {
                return Ok(pending.operation.clone());
            }
            pending.operation.clone()
        };

        let mut finished = finished;
        self.complete(&mut finished);
        self.state.operations.remove(&operation.name);
        Ok(finished)
    }
}

impl CloudClientFactory for MemoryCloud {
    fn clients(&self, project: &str, region: &str, zone: &str) -> ConvergeResult<CloudClients> {
        let handle = Arc::new(self.clone());
        Ok(CloudClients::new(
            project,
            region,
            zone,
            handle.clone(),
            handle.clone(),
            handle,
        ))
    }
}
