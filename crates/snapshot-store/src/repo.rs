use std::sync::Arc;

use watch_core::{FlashFeedSnapshot, Snapshot};

use crate::{history_path, BlobStore, StoreError};

/// Pointer blob holding the history path of the latest baseline.
pub const CURRENT_POINTER_KEY: &str = "CURRENT.txt";

/// The last persisted poll cycle: the top-50 snapshot and the flash feed
/// captured alongside it.
pub struct Baseline {
    pub snapshot: Snapshot,
    pub flash_feed: FlashFeedSnapshot,
}

/// Snapshot persistence over any [`BlobStore`]. Three blobs per cycle: the
/// `CURRENT.txt` pointer, `{path}.json` (player list) and `{path}.flashes`
/// (flash feed). History blobs are never deleted; every cycle adds to the
/// audit trail.
pub struct SnapshotRepo {
    store: Arc<dyn BlobStore>,
}

impl SnapshotRepo {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Follow the pointer to the last persisted baseline.
    pub async fn load_previous(&self) -> Result<Baseline, StoreError> {
        let path = self.store.get(CURRENT_POINTER_KEY).await?;
        let path = path.trim();

        let snapshot_key = format!("{path}.json");
        let raw = self.store.get(&snapshot_key).await?;
        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|source| {
            StoreError::Corrupt {
                key: snapshot_key,
                source,
            }
        })?;

        let feed_key = format!("{path}.flashes");
        let raw = self.store.get(&feed_key).await?;
        let flash_feed: FlashFeedSnapshot =
            serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                key: feed_key,
                source,
            })?;

        Ok(Baseline {
            snapshot,
            flash_feed,
        })
    }

    /// Persist a new baseline and return its history path. History blobs are
    /// written before the pointer so a failed write never leaves the pointer
    /// dangling.
    pub async fn save_baseline(
        &self,
        snapshot: &Snapshot,
        feed: &FlashFeedSnapshot,
    ) -> Result<String, StoreError> {
        let path = history_path(feed.server_timestamp);

        let snapshot_key = format!("{path}.json");
        let body = serde_json::to_string(snapshot).map_err(|source| StoreError::Corrupt {
            key: snapshot_key.clone(),
            source,
        })?;
        self.store.put(&snapshot_key, &body).await?;

        let feed_key = format!("{path}.flashes");
        let body = serde_json::to_string(feed).map_err(|source| StoreError::Corrupt {
            key: feed_key.clone(),
            source,
        })?;
        self.store.put(&feed_key, &body).await?;

        self.store.put(CURRENT_POINTER_KEY, &path).await?;
        Ok(path)
    }
}
