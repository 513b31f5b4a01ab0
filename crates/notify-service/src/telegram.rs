use async_trait::async_trait;
use watch_core::ChangeEvent;

use crate::{MessageRef, NotificationSink, NotifyError};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API sink: broadcast chat only, no threading and no
/// per-player destinations.
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn announce(&self, event: &ChangeEvent) -> Result<Option<MessageRef>, NotifyError> {
        let url = format!("{TELEGRAM_API_BASE}/bot{}/sendMessage", self.token);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", event.message().as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Telegram(format!(
                "HTTP {} from sendMessage",
                response.status()
            )));
        }
        Ok(None)
    }
}
