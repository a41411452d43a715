//! Binary artifacts copied between stores.

use super::error::TransferError;
use super::store::ArtifactStore;
use super::{AssetTransferer, InventoryAsset};
use crate::cloud::utils::last_component;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Copies a binary into `{destination}/{file name}`.
pub struct FileAssetTransferer {
    destination: String,
    store: Arc<dyn ArtifactStore>,
}

impl FileAssetTransferer {
    pub fn new(destination: impl Into<String>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            destination: destination.into(),
            store,
        }
    }

    pub fn destination_for(&self, source: &str) -> String {
        format!(
            "{}/{}",
            self.destination.trim_end_matches('/'),
            last_component(source)
        )
    }
}

#[async_trait]
impl AssetTransferer for FileAssetTransferer {
    async fn transfer(&self, asset: &InventoryAsset) -> Result<(), TransferError> {
        let destination = self.destination_for(&asset.data);
        let contents = self.store.read(&asset.data).await?;
        self.store.write(&destination, &contents).await?;

        info!(
            source = %asset.data,
            destination = %destination,
            bytes = contents.len(),
            "Copied file asset"
        );
        Ok(())
    }
}
