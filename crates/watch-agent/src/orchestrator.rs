use std::sync::Arc;

use anyhow::Result;
use invaders_client::LeaderboardSource;
use notify_service::NotificationSink;
use snapshot_store::{Baseline, SnapshotRepo};
use watch_core::{compute_diff, find_candidates, ChangeKind, FlashFeedSnapshot, Snapshot};

/// Outcome of one poll cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub bootstrapped: bool,
    pub changes: usize,
    pub notifications: usize,
    pub persisted_path: Option<String>,
}

/// One-shot poll cycle: fetch, diff, notify, persist. Holds no state across
/// invocations beyond what the snapshot store carries; the scheduler
/// guarantees at most one concurrent run.
pub struct PollOrchestrator {
    source: Arc<dyn LeaderboardSource>,
    repo: SnapshotRepo,
    sinks: Vec<Arc<dyn NotificationSink>>,
    home_city: String,
    persist_on_empty_diff: bool,
}

impl PollOrchestrator {
    pub fn new(
        source: Arc<dyn LeaderboardSource>,
        repo: SnapshotRepo,
        sinks: Vec<Arc<dyn NotificationSink>>,
        home_city: impl Into<String>,
        persist_on_empty_diff: bool,
    ) -> Self {
        Self {
            source,
            repo,
            sinks,
            home_city: home_city.into(),
            persist_on_empty_diff,
        }
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        // A failed leaderboard fetch (after the client's retries) aborts the
        // whole invocation before any notification goes out.
        let current = self.source.fetch_top50().await?;
        tracing::info!("fetched top 50 ({} entries)", current.len());

        match self.repo.load_previous().await {
            Ok(baseline) => self.normal_cycle(current, baseline).await,
            Err(e) => {
                // First run and corrupted baseline take the same path: start
                // over from the current state.
                tracing::warn!("no usable baseline ({}), bootstrapping", e);
                self.bootstrap(current).await
            }
        }
    }

    /// No diff on the first run: persist the current state as the baseline
    /// and provision per-player destinations, with zero notifications.
    async fn bootstrap(&self, current: Snapshot) -> Result<CycleReport> {
        let feed = self.source.fetch_flash_feed().await?;
        let persisted_path = self.persist(&current, &feed).await;

        for player in current.iter() {
            for sink in &self.sinks {
                if let Err(e) = sink.provision(player).await {
                    tracing::warn!(
                        "failed to provision {} on {}: {}",
                        player.name,
                        sink.name(),
                        e
                    );
                }
            }
        }

        Ok(CycleReport {
            bootstrapped: true,
            changes: 0,
            notifications: 0,
            persisted_path,
        })
    }

    async fn normal_cycle(&self, current: Snapshot, baseline: Baseline) -> Result<CycleReport> {
        let changes = compute_diff(&current, &baseline.snapshot);

        if changes.is_empty() {
            tracing::info!("no changes detected");
            let persisted_path = if self.persist_on_empty_diff {
                let feed = self.source.fetch_flash_feed().await?;
                self.persist(&current, &feed).await
            } else {
                None
            };
            return Ok(CycleReport {
                bootstrapped: false,
                changes: 0,
                notifications: 0,
                persisted_path,
            });
        }

        tracing::info!("{} change(s) detected", changes.len());
        let feed = self.source.fetch_flash_feed().await?;

        let mut notifications = 0;
        for event in &changes {
            tracing::info!("{}", event.message());

            // Correlate against the feed captured with the *previous*
            // snapshot: those are the flashes that happened between the two
            // observations. Renames have no flash to attribute.
            let candidates = match event.kind {
                ChangeKind::Rename { .. } => Vec::new(),
                _ => find_candidates(&event.player.name, &self.home_city, &baseline.flash_feed),
            };

            for sink in &self.sinks {
                // Delivery errors other than the benign ones the sinks
                // swallow themselves abort the remaining notifications.
                let primary = sink.announce(event).await?;
                notifications += 1;

                if let Some(primary) = primary {
                    if !candidates.is_empty() {
                        sink.provision(&event.player).await?;
                    }
                    for flash in &candidates {
                        sink.corroborate(&primary, flash).await?;
                    }
                }
            }
        }

        let persisted_path = self.persist(&current, &feed).await;
        Ok(CycleReport {
            bootstrapped: false,
            changes: changes.len(),
            notifications,
            persisted_path,
        })
    }

    /// Persistence failures are logged and swallowed: the next cycle then
    /// re-diffs against the stale baseline, an accepted trade-off.
    async fn persist(&self, snapshot: &Snapshot, feed: &FlashFeedSnapshot) -> Option<String> {
        match self.repo.save_baseline(snapshot, feed).await {
            Ok(path) => {
                tracing::info!("baseline persisted at {}", path);
                Some(path)
            }
            Err(e) => {
                tracing::error!("failed to persist baseline: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use invaders_client::ClientError;
    use notify_service::{MessageRef, NotifyError};
    use snapshot_store::{history_path, BlobStore, MemoryStore, CURRENT_POINTER_KEY};
    use tokio::sync::Mutex;
    use watch_core::{ChangeEvent, FlashEvent, PlayerEntry};

    struct StubSource {
        snapshot: Snapshot,
        feed: FlashFeedSnapshot,
    }

    #[async_trait]
    impl LeaderboardSource for StubSource {
        async fn fetch_top50(&self) -> Result<Snapshot, ClientError> {
            Ok(self.snapshot.clone())
        }

        async fn fetch_flash_feed(&self) -> Result<FlashFeedSnapshot, ClientError> {
            Ok(self.feed.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        announced: Mutex<Vec<String>>,
        corroborated: Mutex<Vec<String>>,
        provisioned: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn announce(&self, event: &ChangeEvent) -> Result<Option<MessageRef>, NotifyError> {
            self.announced.lock().await.push(event.message());
            Ok(Some(MessageRef {
                channel: event.player.channel_name(),
                ts: "1.0".to_string(),
            }))
        }

        async fn corroborate(
            &self,
            _primary: &MessageRef,
            flash: &FlashEvent,
        ) -> Result<(), NotifyError> {
            self.corroborated.lock().await.push(flash.city.clone());
            Ok(())
        }

        async fn provision(&self, player: &PlayerEntry) -> Result<(), NotifyError> {
            self.provisioned.lock().await.push(player.channel_name());
            Ok(())
        }
    }

    fn entry(name: &str, score: i64, invaders: i64, rank: u32) -> PlayerEntry {
        PlayerEntry {
            name: name.to_string(),
            score,
            invaders_count: invaders,
            rank,
            city_count: 1,
        }
    }

    fn feed(server_timestamp: i64, events: Vec<FlashEvent>) -> FlashFeedSnapshot {
        FlashFeedSnapshot {
            server_timestamp,
            events,
        }
    }

    fn flash(player: &str, city: &str, timestamp: i64) -> FlashEvent {
        FlashEvent {
            player: player.to_string(),
            city: city.to_string(),
            timestamp,
            image_ref: "/f.png".to_string(),
        }
    }

    fn orchestrator(
        source: StubSource,
        store: Arc<MemoryStore>,
        sink: Arc<RecordingSink>,
        persist_on_empty_diff: bool,
    ) -> PollOrchestrator {
        PollOrchestrator::new(
            Arc::new(source),
            SnapshotRepo::new(store),
            vec![sink],
            "Paris",
            persist_on_empty_diff,
        )
    }

    #[tokio::test]
    async fn bootstrap_persists_without_notifying() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let source = StubSource {
            snapshot: Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            feed: feed(1_700_000_000, Vec::new()),
        };

        let report = orchestrator(source, store.clone(), sink.clone(), false)
            .run_once()
            .await
            .unwrap();

        assert!(report.bootstrapped);
        assert_eq!(report.notifications, 0);
        assert!(sink.announced.lock().await.is_empty());
        assert_eq!(*sink.provisioned.lock().await, vec!["bob".to_string()]);
        assert_eq!(
            store.get(CURRENT_POINTER_KEY).await.unwrap(),
            history_path(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn score_change_is_announced_and_corroborated() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        // Previous cycle: Bob at rank 10, with one attributable flash in the
        // stored feed's recency window.
        let repo = SnapshotRepo::new(store.clone());
        repo.save_baseline(
            &Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            &feed(1_700_000_000, vec![flash("Bob", "Lyon", 1_699_999_900)]),
        )
        .await
        .unwrap();

        let source = StubSource {
            snapshot: Snapshot::from_entries(vec![entry("Bob", 150, 7, 9)]),
            feed: feed(1_700_000_600, Vec::new()),
        };

        let report = orchestrator(source, store.clone(), sink.clone(), false)
            .run_once()
            .await
            .unwrap();

        assert!(!report.bootstrapped);
        assert_eq!(report.changes, 1);
        assert_eq!(report.notifications, 1);
        assert_eq!(
            *sink.announced.lock().await,
            vec!["9. Bob flashed 2 \u{1F47E} for 50 pts".to_string()]
        );
        assert_eq!(*sink.corroborated.lock().await, vec!["Lyon".to_string()]);
        assert_eq!(*sink.provisioned.lock().await, vec!["bob".to_string()]);

        // The new baseline replaced the pointer.
        assert_eq!(
            store.get(CURRENT_POINTER_KEY).await.unwrap(),
            history_path(1_700_000_600)
        );
    }

    #[tokio::test]
    async fn renames_are_announced_but_never_corroborated() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        let repo = SnapshotRepo::new(store.clone());
        repo.save_baseline(
            &Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            &feed(1_700_000_000, vec![flash("ANONYMOUS", "Paris", 1_699_999_950)]),
        )
        .await
        .unwrap();

        let source = StubSource {
            snapshot: Snapshot::from_entries(vec![entry("Bobby", 100, 5, 10)]),
            feed: feed(1_700_000_600, Vec::new()),
        };

        let report = orchestrator(source, store, sink.clone(), false)
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.changes, 1);
        assert_eq!(
            *sink.announced.lock().await,
            vec!["10. Bob is now known as Bobby".to_string()]
        );
        assert!(sink.corroborated.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_diff_skips_persistence_by_default() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        let repo = SnapshotRepo::new(store.clone());
        repo.save_baseline(
            &Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            &feed(1_700_000_000, Vec::new()),
        )
        .await
        .unwrap();

        let source = StubSource {
            // Same identity, different rank: not a change.
            snapshot: Snapshot::from_entries(vec![entry("Bob", 100, 5, 8)]),
            feed: feed(1_700_000_600, Vec::new()),
        };

        let report = orchestrator(source, store.clone(), sink.clone(), false)
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.changes, 0);
        assert!(report.persisted_path.is_none());
        assert!(sink.announced.lock().await.is_empty());
        assert_eq!(
            store.get(CURRENT_POINTER_KEY).await.unwrap(),
            history_path(1_700_000_000)
        );
    }

    #[tokio::test]
    async fn empty_diff_persists_when_configured() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        let repo = SnapshotRepo::new(store.clone());
        repo.save_baseline(
            &Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            &feed(1_700_000_000, Vec::new()),
        )
        .await
        .unwrap();

        let source = StubSource {
            snapshot: Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            feed: feed(1_700_000_600, Vec::new()),
        };

        let report = orchestrator(source, store.clone(), sink, true)
            .run_once()
            .await
            .unwrap();

        assert_eq!(report.changes, 0);
        assert_eq!(report.persisted_path.as_deref(), Some(history_path(1_700_000_600).as_str()));
        assert_eq!(
            store.get(CURRENT_POINTER_KEY).await.unwrap(),
            history_path(1_700_000_600)
        );
    }

    #[tokio::test]
    async fn corrupt_baseline_routes_to_bootstrap() {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());

        // Dangling pointer: the blob it names was never written.
        store.put(CURRENT_POINTER_KEY, "2021/01/x").await.unwrap();

        let source = StubSource {
            snapshot: Snapshot::from_entries(vec![entry("Bob", 100, 5, 10)]),
            feed: feed(1_700_000_000, Vec::new()),
        };

        let report = orchestrator(source, store, sink.clone(), false)
            .run_once()
            .await
            .unwrap();

        assert!(report.bootstrapped);
        assert!(sink.announced.lock().await.is_empty());
        assert!(report.persisted_path.is_some());
    }
}
