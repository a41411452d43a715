//! # Resource Kinds
//!
//! Concrete [`DeltaTask`](crate::task::DeltaTask) implementations for the
//! resources a cluster is made of. Each kind renders to both targets.

pub mod cluster;
pub mod network;
pub mod node_pool;

pub use cluster::{ContainerCluster, ContainerClusterChanges};
pub use network::Network;
pub use node_pool::{NodePool, NodePoolChanges};
