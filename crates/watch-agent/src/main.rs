//! invader-watch: poll the top-50 leaderboard, diff against the last
//! persisted snapshot, notify Slack/Telegram about the changes, and persist
//! the new baseline. One cycle per invocation; the scheduler drives the
//! cadence.

mod config;
mod orchestrator;

use std::sync::Arc;

use anyhow::Result;
use config::WatchConfig;
use invaders_client::InvadersClient;
use notify_service::{NotificationSink, SlackNotifier, TelegramNotifier};
use orchestrator::PollOrchestrator;
use snapshot_store::{AzureBlobStore, BlobStore, LocalFsStore, SnapshotRepo};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watch_agent=info,invaders_client=info,snapshot_store=warn".into()),
        )
        .init();

    let config = WatchConfig::from_env()?;
    tracing::info!("Starting invader-watch poll cycle");
    tracing::info!("  Mode: {}", if config.local_mode { "local" } else { "remote" });
    tracing::info!("  Home city: {}", config.home_city);
    tracing::info!("  Persist on empty diff: {}", config.persist_on_empty_diff);

    let store: Arc<dyn BlobStore> = if config.local_mode {
        Arc::new(LocalFsStore::new(&config.local_store_root))
    } else {
        let conn = config
            .storage_connection_string
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("STORAGE_CONNECTION_STRING must be set"))?;
        Arc::new(AzureBlobStore::from_connection_string(
            conn,
            &config.storage_container,
        )?)
    };

    let client = InvadersClient::new(&config.invaders_base_url, config.http_timeout)
        .with_mirror(store.clone(), config.local_mode);

    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if let Some(token) = &config.slack_token {
        sinks.push(Arc::new(SlackNotifier::new(
            token.clone(),
            config.slack_broadcast_channel.clone(),
            config.invaders_base_url.clone(),
        )));
        tracing::info!(
            "Slack notifications enabled (broadcast {})",
            config.slack_broadcast_channel
        );
    }
    if let (Some(token), Some(chat_id)) = (&config.telegram_token, &config.telegram_chat_id) {
        sinks.push(Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone())));
        tracing::info!("Telegram notifications enabled");
    }
    if sinks.is_empty() {
        tracing::warn!("No notification sinks configured (set SLACK_TOKEN or TELEGRAM_TOKEN)");
    }

    let orchestrator = PollOrchestrator::new(
        Arc::new(client),
        SnapshotRepo::new(store),
        sinks,
        config.home_city.clone(),
        config.persist_on_empty_diff,
    );

    let report = orchestrator.run_once().await?;
    if report.bootstrapped {
        tracing::info!("Bootstrap complete: baseline persisted, no notifications sent");
    } else {
        tracing::info!(
            "Cycle complete: {} change(s), {} notification(s)",
            report.changes,
            report.notifications
        );
    }
    Ok(())
}
