//! Registry-to-registry image copies.

use super::error::{RuntimeError, TransferError};
use super::runtime::ContainerRuntime;
use super::{AssetTransferer, InventoryAsset};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Destination tag for `image` inside `repository`.
///
/// The tag is whatever follows the last `:`, the base name whatever follows
/// the last `/` before it: `gcr.io/foo/bar:v1.2.3` into `quay.io/dst` is
/// `quay.io/dst/bar:v1.2.3`.
pub fn retag_image(image: &str, repository: &str) -> Result<String, TransferError> {
    let invalid = |reason: &str| TransferError::InvalidImageReference {
        reference: image.to_string(),
        reason: reason.to_string(),
    };

    let (name, version) = image.rsplit_once(':').ok_or_else(|| invalid("no tag"))?;
    if version.is_empty() || version.contains('/') {
        return Err(invalid("no tag"));
    }
    let base = name.rsplit('/').next().unwrap_or(name);
    if base.is_empty() {
        return Err(invalid("empty image name"));
    }

    Ok(format!(
        "{}/{}:{}",
        repository.trim_end_matches('/'),
        base,
        version
    ))
}

/// Tag `source` as `destination` and push it.
pub(crate) async fn push_as(
    runtime: &dyn ContainerRuntime,
    source: &str,
    destination: &str,
) -> Result<(), TransferError> {
    runtime.tag(source, destination).await?;
    runtime.push(destination).await?;
    info!(source = %source, destination = %destination, "Pushed image");
    Ok(())
}

/// Remove every local image, attempting all of them; returns the first error.
pub(crate) async fn remove_local(
    runtime: &dyn ContainerRuntime,
    images: &[&str],
) -> Result<(), RuntimeError> {
    let mut first_error = None;
    for image in images {
        if let Err(err) = runtime.remove(image).await {
            warn!(image = %image, error = %err, "Failed to remove local image");
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// The primary result wins; a cleanup failure only surfaces after success.
pub(crate) fn settle(
    primary: Result<(), TransferError>,
    cleanup: Result<(), RuntimeError>,
) -> Result<(), TransferError> {
    match (primary, cleanup) {
        (Err(err), _) => Err(err),
        (Ok(()), Err(cleanup)) => Err(cleanup.into()),
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Pulls an image, pushes it into the staging repository and removes both
/// local copies.
pub struct ContainerAssetTransferer {
    repository: String,
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerAssetTransferer {
    pub fn new(repository: impl Into<String>, runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            repository: repository.into(),
            runtime,
        }
    }
}

#[async_trait]
impl AssetTransferer for ContainerAssetTransferer {
    async fn transfer(&self, asset: &InventoryAsset) -> Result<(), TransferError> {
        let source = asset.data.as_str();
        let destination = retag_image(source, &self.repository)?;

        self.runtime.pull(source).await?;
        let pushed = push_as(self.runtime.as_ref(), source, &destination).await;
        let cleanup = remove_local(self.runtime.as_ref(), &[source, destination.as_str()]).await;
        settle(pushed, cleanup)
    }
}
