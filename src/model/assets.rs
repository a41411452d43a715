//! Artifacts every node needs for a given Kubernetes version.

use super::spec::AssetSources;
use crate::staging::InventoryAsset;

const NODE_BINARIES: [&str; 2] = ["kubelet", "kubectl"];
const PAUSE_IMAGE: &str = "pause-amd64:3.0";

/// Binaries with their checksum files, the proxy and pause images, then the
/// protokube archive when one is configured.
pub fn node_assets(sources: &AssetSources, kubernetes_version: &str) -> Vec<InventoryAsset> {
    let version = normalize_version(kubernetes_version);
    let base = format!(
        "{}/{}/bin/linux/amd64",
        sources.file_repository.trim_end_matches('/'),
        version
    );
    let registry = sources.image_registry.trim_end_matches('/');

    let mut assets = Vec::new();
    for binary in NODE_BINARIES {
        assets.push(InventoryAsset::binary(format!("{base}/{binary}")));
        assets.push(InventoryAsset::binary(format!("{base}/{binary}.sha1")));
    }
    assets.push(InventoryAsset::container(format!(
        "{registry}/kube-proxy:{version}"
    )));
    assets.push(InventoryAsset::container(format!("{registry}/{PAUSE_IMAGE}")));
    if let Some(protokube) = &sources.protokube_image {
        assets.push(InventoryAsset::container_binary(protokube.clone()));
    }
    assets
}

/// `1.9.7` and `v1.9.7` both become `v1.9.7`.
fn normalize_version(version: &str) -> String {
    format!("v{}", version.trim_start_matches('v'))
}
