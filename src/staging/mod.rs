//! # Artifact Staging
//!
//! Copies every artifact a cluster depends on into operator-controlled
//! storage before the cluster is converged, so nodes never reach out to
//! upstream locations.
//!
//! ## Architecture
//!
//! - [`InventoryAsset`]s come out of a dry run of the task graph.
//! - One [`AssetTransferer`] is registered per [`AssetType`]:
//!   [`FileAssetTransferer`] for binaries, [`ContainerAssetTransferer`] for
//!   registry images and [`ContainerFileAssetTransferer`] for image archives.
//! - [`StageInventory::run`] walks the inventory in order and stops at the
//!   first failure, reporting the failing asset's type and data.

pub mod asset;
pub mod container;
pub mod container_file;
pub mod error;
pub mod file;
pub mod runtime;
pub mod store;

pub use asset::{AssetType, InventoryAsset};
pub use container::{retag_image, ContainerAssetTransferer};
pub use container_file::{loaded_image, ContainerFileAssetTransferer};
pub use error::{RuntimeError, StoreError, TransferError};
pub use file::FileAssetTransferer;
pub use runtime::{ContainerRuntime, DockerCli};
pub use store::{ArtifactStore, HttpStore, LocalStore, MemoryStore, VfsStore};

use crate::config::StagingConfig;
use crate::constants::events;
use crate::error::{ConvergeError, ConvergeResult};
use crate::events::EventPublisher;
use crate::logging::log_asset_operation;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Moves one kind of asset into staging storage.
#[async_trait]
pub trait AssetTransferer: Send + Sync {
    async fn transfer(&self, asset: &InventoryAsset) -> Result<(), TransferError>;
}

/// Outcome of a staging pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageReport {
    pub staged: Vec<InventoryAsset>,
    /// Assets whose type has no registered transferer.
    pub skipped: Vec<InventoryAsset>,
}

#[derive(Default)]
pub struct StageInventory {
    transferers: HashMap<AssetType, Arc<dyn AssetTransferer>>,
    publisher: Option<EventPublisher>,
}

impl StageInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the standard transferers the configuration enables.
    pub fn from_config(
        config: &StagingConfig,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn ArtifactStore>,
    ) -> ConvergeResult<Self> {
        config.validate()?;
        let mut inventory = Self::new();

        if let (true, Some(destination)) = (config.stage_files, config.file_destination()) {
            inventory.register(
                AssetType::Binary,
                Arc::new(FileAssetTransferer::new(destination, Arc::clone(&store))),
            );
        }

        if let (true, Some(repository)) = (config.stage_containers, config.container_repository())
        {
            inventory.register(
                AssetType::Container,
                Arc::new(ContainerAssetTransferer::new(
                    repository,
                    Arc::clone(&runtime),
                )),
            );
            inventory.register(
                AssetType::ContainerBinary,
                Arc::new(ContainerFileAssetTransferer::new(
                    repository,
                    config.scratch_dir.clone(),
                    runtime,
                    store,
                )),
            );
        }

        Ok(inventory)
    }

    pub fn with_publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replaces any transferer already registered for the type.
    pub fn register(&mut self, asset_type: AssetType, transferer: Arc<dyn AssetTransferer>) {
        self.transferers.insert(asset_type, transferer);
    }

    pub fn handles(&self, asset_type: AssetType) -> bool {
        self.transferers.contains_key(&asset_type)
    }

    /// Stage `assets` in order, stopping at the first failure.
    pub async fn run(
        &self,
        assets: &[InventoryAsset],
        cancel: &CancellationToken,
    ) -> ConvergeResult<StageReport> {
        let mut report = StageReport::default();

        for asset in assets {
            if cancel.is_cancelled() {
                return Err(ConvergeError::Cancelled);
            }

            let Some(transferer) = self.transferers.get(&asset.asset_type) else {
                info!(asset = %asset, "No transferer registered; skipping asset");
                self.publish(events::ASSET_SKIPPED, asset);
                report.skipped.push(asset.clone());
                continue;
            };

            let started = Instant::now();
            let type_name = asset.asset_type.to_string();
            if let Err(source) = transferer.transfer(asset).await {
                log_asset_operation("stage", &type_name, &asset.data, "failed", None);
                return Err(ConvergeError::TransferFailed {
                    asset_type: asset.asset_type,
                    data: asset.data.clone(),
                    source,
                });
            }

            log_asset_operation(
                "stage",
                &type_name,
                &asset.data,
                "staged",
                Some(started.elapsed().as_millis() as u64),
            );
            self.publish(events::ASSET_STAGED, asset);
            report.staged.push(asset.clone());
        }

        Ok(report)
    }

    fn publish(&self, event: &str, asset: &InventoryAsset) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(
                event,
                json!({ "type": asset.asset_type, "data": asset.data }),
            );
        }
    }
}
