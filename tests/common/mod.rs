#![allow(dead_code)]

pub mod fakes;
pub mod strategies;

pub use fakes::*;

use clusterup_core::model::{ClusterSpec, InstanceGroupRole, InstanceGroupSpec};

/// A small cluster with a default pool and one extra pool.
pub fn cluster_spec(name: &str) -> ClusterSpec {
    ClusterSpec::new(name, "my-project", "us-central1-a", "1.9.7")
        .with_instance_group(InstanceGroupSpec::new(
            "master",
            InstanceGroupRole::Master,
            "n1-standard-1",
            1,
        ))
        .with_instance_group(InstanceGroupSpec::new(
            "nodes",
            InstanceGroupRole::Node,
            "n1-standard-2",
            3,
        ))
        .with_instance_group(InstanceGroupSpec::new(
            "highmem",
            InstanceGroupRole::Node,
            "n1-highmem-4",
            1,
        ))
}
