use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use snapshot_store::BlobStore;
use watch_core::{FlashEvent, FlashFeedSnapshot, PlayerEntry, Snapshot};

pub const DEFAULT_BASE_URL: &str = "http://space-invaders.com";

/// Bounded retry: 5 attempts with exponential backoff from a 1s base, on
/// connection failures and 500/502/504 responses only.
const MAX_ATTEMPTS: u32 = 5;
const BACKOFF_BASE_SECS: u64 = 1;

/// Mirror keys for raw endpoint responses (local replay).
const HIGHSCORE_MIRROR_KEY: &str = "highscore.json";
const FLASH_MIRROR_KEY: &str = "last_flash.json";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection to {url} failed after {attempts} attempt(s): {source}")]
    Connection {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Read access to the leaderboard and flash endpoints. The seam lets the
/// orchestrator run against stub data in tests.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    async fn fetch_top50(&self) -> Result<Snapshot, ClientError>;
    async fn fetch_flash_feed(&self) -> Result<FlashFeedSnapshot, ClientError>;
}

pub struct InvadersClient {
    base_url: String,
    client: reqwest::Client,
    mirror: Option<Arc<dyn BlobStore>>,
    replay: bool,
}

impl InvadersClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into(),
            client,
            mirror: None,
            replay: false,
        }
    }

    /// Mirror raw responses into `store` under well-known keys. With
    /// `replay`, the mirror is consulted before the network so offline runs
    /// reuse the last captured payloads.
    pub fn with_mirror(mut self, store: Arc<dyn BlobStore>, replay: bool) -> Self {
        self.mirror = Some(store);
        self.replay = replay;
        self
    }

    pub async fn fetch_top50(&self) -> Result<Snapshot, ClientError> {
        // Cache-busting uid, the API serves stale payloads without it.
        let url = format!(
            "{}/api/highscore/?uid={}",
            self.base_url,
            uuid::Uuid::new_v4()
        );
        let body = self.fetch(&url, HIGHSCORE_MIRROR_KEY).await?;
        parse_top50(&body)
    }

    pub async fn fetch_flash_feed(&self) -> Result<FlashFeedSnapshot, ClientError> {
        let url = format!("{}/flashinvaders/flashes/", self.base_url);
        let body = self.fetch(&url, FLASH_MIRROR_KEY).await?;
        parse_flash_feed(&body)
    }

    async fn fetch(&self, url: &str, mirror_key: &str) -> Result<String, ClientError> {
        if self.replay {
            if let Some(store) = &self.mirror {
                match store.get(mirror_key).await {
                    Ok(body) => {
                        tracing::debug!("serving {} from local mirror", mirror_key);
                        return Ok(body);
                    }
                    Err(e) => tracing::warn!("local mirror miss for {}: {}", mirror_key, e),
                }
            }
        }

        let body = self.fetch_with_retry(url).await?;

        if let Some(store) = &self.mirror {
            if let Err(e) = store.put(mirror_key, &body).await {
                tracing::warn!("failed to mirror {}: {}", mirror_key, e);
            }
        }
        Ok(body)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, ClientError> {
        let mut delay = Duration::from_secs(BACKOFF_BASE_SECS);
        let mut attempt = 1u32;

        loop {
            tracing::info!("API call: {} (attempt {}/{})", url, attempt, MAX_ATTEMPTS);
            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if response.status().is_success() {
                        return response.text().await.map_err(|source| {
                            ClientError::Connection {
                                url: url.to_string(),
                                attempts: attempt,
                                source,
                            }
                        });
                    }
                    if !retryable_status(status) || attempt == MAX_ATTEMPTS {
                        return Err(ClientError::Status {
                            status,
                            url: url.to_string(),
                        });
                    }
                    tracing::warn!("HTTP {} from {}, retrying in {:?}", status, url, delay);
                }
                Err(source) => {
                    if attempt == MAX_ATTEMPTS {
                        return Err(ClientError::Connection {
                            url: url.to_string(),
                            attempts: attempt,
                            source,
                        });
                    }
                    tracing::warn!("request to {} failed ({}), retrying in {:?}", url, source, delay);
                }
            }

            tokio::time::sleep(delay).await;
            delay *= 2;
            attempt += 1;
        }
    }
}

#[async_trait]
impl LeaderboardSource for InvadersClient {
    async fn fetch_top50(&self) -> Result<Snapshot, ClientError> {
        InvadersClient::fetch_top50(self).await
    }

    async fn fetch_flash_feed(&self) -> Result<FlashFeedSnapshot, ClientError> {
        InvadersClient::fetch_flash_feed(self).await
    }
}

fn retryable_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 504)
}

#[derive(Debug, Deserialize)]
struct HighscoreResponse {
    #[serde(rename = "Players")]
    players: Vec<PlayerEntry>,
}

/// Parse the highscore payload, keeping ranks 1..=50 in API order.
pub fn parse_top50(body: &str) -> Result<Snapshot, ClientError> {
    let response: HighscoreResponse = serde_json::from_str(body)?;
    Ok(Snapshot::from_entries(response.players))
}

#[derive(Debug, Deserialize)]
struct FlashFeedResponse {
    timestamp: i64,
    with_paris: Vec<FlashEvent>,
}

pub fn parse_flash_feed(body: &str) -> Result<FlashFeedSnapshot, ClientError> {
    let response: FlashFeedResponse = serde_json::from_str(body)?;
    Ok(FlashFeedSnapshot {
        server_timestamp: response.timestamp,
        events: response.with_paris,
    })
}
