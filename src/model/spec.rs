//! Operator-facing description of a cluster.

use crate::cloud::utils::zone_to_region;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_FILE_REPOSITORY: &str = "https://storage.googleapis.com/kubernetes-release/release";
pub const DEFAULT_IMAGE_REGISTRY: &str = "k8s.gcr.io";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    pub name: String,
    pub project: String,
    #[serde(default)]
    pub region: Option<String>,
    pub zone: String,
    pub kubernetes_version: String,
    #[serde(default)]
    pub network: NetworkSpec,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroupSpec>,
    #[serde(default)]
    pub assets: AssetSources,
    /// Extra zones nodes are spread across, beyond `zone`.
    #[serde(default)]
    pub additional_zones: Vec<String>,
}

impl ClusterSpec {
    pub fn new(
        name: impl Into<String>,
        project: impl Into<String>,
        zone: impl Into<String>,
        kubernetes_version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            project: project.into(),
            region: None,
            zone: zone.into(),
            kubernetes_version: kubernetes_version.into(),
            network: NetworkSpec::default(),
            instance_groups: Vec::new(),
            assets: AssetSources::default(),
            additional_zones: Vec::new(),
        }
    }

    pub fn with_instance_group(mut self, group: InstanceGroupSpec) -> Self {
        self.instance_groups.push(group);
        self
    }

    /// Explicit region, else the one containing `zone`, else `zone` itself.
    pub fn region(&self) -> String {
        self.region
            .clone()
            .or_else(|| zone_to_region(&self.zone).map(str::to_string))
            .unwrap_or_else(|| self.zone.clone())
    }

    /// Name of the network task, defaulting to the cluster name.
    pub fn network_name(&self) -> &str {
        self.network.name.as_deref().unwrap_or(&self.name)
    }

    pub fn node_groups(&self) -> impl Iterator<Item = &InstanceGroupSpec> {
        self.instance_groups
            .iter()
            .filter(|group| group.role == InstanceGroupRole::Node)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub name: Option<String>,
    /// The network is owned elsewhere and must already exist.
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub auto_create_subnetworks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceGroupRole {
    Master,
    Node,
    Bastion,
}

impl InstanceGroupRole {
    pub fn default_root_volume_size(&self) -> i64 {
        match self {
            Self::Master => 64,
            Self::Node => 128,
            Self::Bastion => 32,
        }
    }
}

impl fmt::Display for InstanceGroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master => write!(f, "master"),
            Self::Node => write!(f, "node"),
            Self::Bastion => write!(f, "bastion"),
        }
    }
}

impl FromStr for InstanceGroupRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "node" => Ok(Self::Node),
            "bastion" => Ok(Self::Bastion),
            _ => Err(format!("Invalid instance group role: {s}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupSpec {
    pub name: String,
    pub role: InstanceGroupRole,
    pub machine_type: String,
    pub min_size: i64,
    #[serde(default)]
    pub root_volume_size: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub preemptible: bool,
}

impl InstanceGroupSpec {
    pub fn new(
        name: impl Into<String>,
        role: InstanceGroupRole,
        machine_type: impl Into<String>,
        min_size: i64,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            machine_type: machine_type.into(),
            min_size,
            root_volume_size: None,
            image: None,
            tags: Vec::new(),
            preemptible: false,
        }
    }

    pub fn root_volume_size(&self) -> i64 {
        self.root_volume_size
            .unwrap_or_else(|| self.role.default_root_volume_size())
    }
}

/// Where node artifacts are fetched from before staging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSources {
    pub file_repository: String,
    pub image_registry: String,
    /// Location of the protokube image archive, if nodes need one.
    #[serde(default)]
    pub protokube_image: Option<String>,
}

impl Default for AssetSources {
    fn default() -> Self {
        Self {
            file_repository: DEFAULT_FILE_REPOSITORY.to_string(),
            image_registry: DEFAULT_IMAGE_REGISTRY.to_string(),
            protokube_image: None,
        }
    }
}
