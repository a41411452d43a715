//! Artifact locations.
//!
//! Locators are URLs: `http(s)://` goes over the network, `file://` or a bare
//! path is the local filesystem, and `memfs://` is an in-process store.

use super::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const HTTP_TIMEOUT: Duration = Duration::from_secs(300);
const MEMORY_SCHEME: &str = "memfs";

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError>;

    async fn write(&self, location: &str, data: &[u8]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    fn path_of(location: &str) -> Result<PathBuf, StoreError> {
        match Url::parse(location) {
            Ok(url) if url.scheme() == "file" => {
                url.to_file_path()
                    .map_err(|_| StoreError::UnsupportedScheme {
                        location: location.to_string(),
                    })
            }
            Ok(_) => Err(StoreError::UnsupportedScheme {
                location: location.to_string(),
            }),
            Err(_) => Ok(PathBuf::from(location)),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalStore {
    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError> {
        let path = Self::path_of(location)?;
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    location: location.to_string(),
                }
            } else {
                StoreError::Io { path, source }
            }
        })
    }

    async fn write(&self, location: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = Self::path_of(location)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|source| StoreError::Io { path, source })
    }
}

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new() -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Http {
                location: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    fn http_error(location: &str, err: reqwest::Error) -> StoreError {
        StoreError::Http {
            location: location.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl ArtifactStore for HttpStore {
    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| Self::http_error(location, e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                location: location.to_string(),
            });
        }
        let response = response
            .error_for_status()
            .map_err(|e| Self::http_error(location, e))?;
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::http_error(location, e))?;
        Ok(body.to_vec())
    }

    async fn write(&self, location: &str, data: &[u8]) -> Result<(), StoreError> {
        self.client
            .put(location)
            .body(data.to_vec())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Self::http_error(location, e))?;
        Ok(())
    }
}

/// Process-local store addressed as `memfs://...`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, location: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(location.into(), data.into());
    }

    pub fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.files.get(location).map(|entry| entry.value().clone())
    }

    pub fn locations(&self) -> Vec<String> {
        let mut locations: Vec<String> =
            self.files.iter().map(|entry| entry.key().clone()).collect();
        locations.sort();
        locations
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError> {
        self.get(location).ok_or_else(|| StoreError::NotFound {
            location: location.to_string(),
        })
    }

    async fn write(&self, location: &str, data: &[u8]) -> Result<(), StoreError> {
        self.insert(location, data.to_vec());
        Ok(())
    }
}

/// Routes each locator to the store for its scheme.
#[derive(Debug, Clone)]
pub struct VfsStore {
    local: LocalStore,
    http: HttpStore,
    memory: MemoryStore,
}

impl VfsStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            local: LocalStore,
            http: HttpStore::new()?,
            memory: MemoryStore::new(),
        })
    }

    /// Share an existing in-process store for `memfs://` locators.
    pub fn with_memory(mut self, memory: MemoryStore) -> Self {
        self.memory = memory;
        self
    }

    fn route(&self, location: &str) -> Result<&dyn ArtifactStore, StoreError> {
        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(&self.http),
                "file" => Ok(&self.local),
                MEMORY_SCHEME => Ok(&self.memory),
                _ => Err(StoreError::UnsupportedScheme {
                    location: location.to_string(),
                }),
            },
            Err(_) if Path::new(location).is_absolute() => Ok(&self.local),
            Err(_) => Err(StoreError::UnsupportedScheme {
                location: location.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ArtifactStore for VfsStore {
    async fn read(&self, location: &str) -> Result<Vec<u8>, StoreError> {
        self.route(location)?.read(location).await
    }

    async fn write(&self, location: &str, data: &[u8]) -> Result<(), StoreError> {
        self.route(location)?.write(location, data).await
    }
}
