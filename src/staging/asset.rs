use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of artifact a cluster depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetType {
    /// A file fetched by URL.
    Binary,
    /// An image pulled from a registry.
    Container,
    /// An image distributed as a downloadable archive.
    ContainerBinary,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => write!(f, "Binary"),
            Self::Container => write!(f, "Container"),
            Self::ContainerBinary => write!(f, "ContainerBinary"),
        }
    }
}

impl FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Binary" => Ok(Self::Binary),
            "Container" => Ok(Self::Container),
            "ContainerBinary" => Ok(Self::ContainerBinary),
            _ => Err(format!("Unknown asset type: {s}")),
        }
    }
}

/// One artifact to stage: a URL for binaries and archives, an image
/// reference for containers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryAsset {
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub data: String,
}

impl InventoryAsset {
    pub fn new(asset_type: AssetType, data: impl Into<String>) -> Self {
        Self {
            asset_type,
            data: data.into(),
        }
    }

    pub fn binary(url: impl Into<String>) -> Self {
        Self::new(AssetType::Binary, url)
    }

    pub fn container(image: impl Into<String>) -> Self {
        Self::new(AssetType::Container, image)
    }

    pub fn container_binary(url: impl Into<String>) -> Self {
        Self::new(AssetType::ContainerBinary, url)
    }
}

impl fmt::Display for InventoryAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type:{} Data:{}", self.asset_type, self.data)
    }
}
