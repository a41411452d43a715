//! Images distributed as downloadable archives.

use super::container::{push_as, remove_local, retag_image, settle};
use super::error::TransferError;
use super::runtime::ContainerRuntime;
use super::store::ArtifactStore;
use super::{AssetTransferer, InventoryAsset};
use crate::cloud::utils::last_component;
use crate::constants::staging::LOADED_IMAGE_MARKER;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Name of the image a load reported, taken from the text after the
/// `Loaded image: ` marker up to the end of that line.
pub fn loaded_image(output: &str) -> Result<String, TransferError> {
    output
        .split_once(LOADED_IMAGE_MARKER)
        .map(|(_, rest)| rest.lines().next().unwrap_or("").trim().to_string())
        .filter(|image| !image.is_empty())
        .ok_or_else(|| TransferError::LoadedImageNotFound {
            output: output.trim().to_string(),
        })
}

/// Removes the file when dropped, whatever happened in between.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    fn new(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(format!("{}-{}", Uuid::new_v4(), file_name)),
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed scratch file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "Failed to remove scratch file")
            }
        }
    }
}

/// Downloads an image archive, loads it, then pushes the loaded image into
/// the staging repository.
pub struct ContainerFileAssetTransferer {
    repository: String,
    scratch_dir: PathBuf,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn ArtifactStore>,
}

impl ContainerFileAssetTransferer {
    pub fn new(
        repository: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            repository: repository.into(),
            scratch_dir: scratch_dir.into(),
            runtime,
            store,
        }
    }

    async fn download(&self, source: &str, scratch: &ScratchFile) -> Result<(), TransferError> {
        let contents = self.store.read(source).await?;
        let scratch_error = |source| TransferError::Scratch {
            path: scratch.path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(scratch_error)?;
        tokio::fs::write(&scratch.path, contents)
            .await
            .map_err(scratch_error)?;
        Ok(())
    }
}

#[async_trait]
impl AssetTransferer for ContainerFileAssetTransferer {
    async fn transfer(&self, asset: &InventoryAsset) -> Result<(), TransferError> {
        let scratch = ScratchFile::new(&self.scratch_dir, last_component(&asset.data));

        self.download(&asset.data, &scratch).await?;
        let output = self.runtime.load(&scratch.path).await?;
        let image = loaded_image(&output)?;

        // The loaded image is local from here on; every path removes it.
        let (pushed, cleanup) = match retag_image(&image, &self.repository) {
            Ok(destination) => {
                let pushed = push_as(self.runtime.as_ref(), &image, &destination).await;
                let cleanup =
                    remove_local(self.runtime.as_ref(), &[image.as_str(), destination.as_str()])
                        .await;
                (pushed, cleanup)
            }
            Err(err) => (
                Err(err),
                remove_local(self.runtime.as_ref(), &[image.as_str()]).await,
            ),
        };
        settle(pushed, cleanup)
    }
}
