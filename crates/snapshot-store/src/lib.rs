mod azure;
mod local;
mod memory;
mod repo;

pub use azure::AzureBlobStore;
pub use local::LocalFsStore;
pub use memory::MemoryStore;
pub use repo::{Baseline, SnapshotRepo, CURRENT_POINTER_KEY};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage transport error: {0}")]
    Transport(String),

    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error("malformed blob {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat key-value blob interface. Keys are slash-separated string paths;
/// bodies are UTF-8 text (JSON in practice). Implementations never delete.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, StoreError>;
    async fn put(&self, key: &str, body: &str) -> Result<(), StoreError>;
}

/// History path for one poll cycle, derived from the flash feed's server
/// timestamp. The year/month prefix namespaces the container and keeps blob
/// listings in chronological order.
pub fn history_path(server_timestamp: i64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp(server_timestamp, 0).unwrap_or_default();
    dt.format("%Y/%m/%Y-%m-%d %H:%M:%S").to_string()
}
