use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::{BlobStore, StoreError};

/// Filesystem mirror of the blob store, used in local mode. Keys map
/// directly to paths under the root directory, same scheme as the remote
/// container.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalFsStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        let path = self.root.join(key);
        tracing::debug!("read file: {}", path.display());
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError> {
        let path = self.root.join(key);
        tracing::debug!("persist file: {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}
