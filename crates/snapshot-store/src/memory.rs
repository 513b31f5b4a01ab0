use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{BlobStore, StoreError};

/// In-memory blob store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.blobs
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError> {
        self.blobs
            .lock()
            .await
            .insert(key.to_string(), body.to_string());
        Ok(())
    }
}
