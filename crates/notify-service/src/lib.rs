mod slack;
mod telegram;

pub use slack::SlackNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use watch_core::{ChangeEvent, FlashEvent, PlayerEntry};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("slack API error: {0}")]
    Slack(String),

    #[error("telegram API error: {0}")]
    Telegram(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Handle to a delivered primary message, used to thread follow-ups.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub channel: String,
    pub ts: String,
}

/// A notification destination. Sinks that cannot thread or provision
/// per-player destinations keep the default no-op implementations.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver the primary notification for a change. Returns a handle when
    /// the sink supports threaded follow-ups.
    async fn announce(&self, event: &ChangeEvent) -> Result<Option<MessageRef>, NotifyError>;

    /// Attach corroborating flash evidence under a primary message.
    async fn corroborate(
        &self,
        _primary: &MessageRef,
        _flash: &FlashEvent,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    /// Provision a per-player destination. Idempotent: re-provisioning an
    /// existing destination is not an error.
    async fn provision(&self, _player: &PlayerEntry) -> Result<(), NotifyError> {
        Ok(())
    }
}
