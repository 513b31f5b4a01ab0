use async_trait::async_trait;
use serde::Deserialize;
use watch_core::{ChangeEvent, FlashEvent, PlayerEntry};

use crate::{MessageRef, NotificationSink, NotifyError};

const SLACK_API_BASE: &str = "https://slack.com/api";

/// Slack Web API sink: every change goes to the broadcast channel and to the
/// player's own channel; flash evidence is threaded under the per-player
/// message.
pub struct SlackNotifier {
    token: String,
    broadcast_channel: String,
    /// Base URL prefixed to flash image refs in follow-up links.
    link_base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(
        token: impl Into<String>,
        broadcast_channel: impl Into<String>,
        link_base_url: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            broadcast_channel: broadcast_channel.into(),
            link_base_url: link_base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<SlackResponse, NotifyError> {
        let response: SlackResponse = self
            .client
            .post(format!("{SLACK_API_BASE}/{method}"))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;
        Ok(response)
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, NotifyError> {
        let mut payload = serde_json::json!({
            "channel": channel,
            "text": text,
        });
        if let Some(ts) = thread_ts {
            payload["thread_ts"] = ts.into();
        }

        let response = self.call("chat.postMessage", payload).await?;
        if !response.ok {
            return Err(NotifyError::Slack(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(response.ts.unwrap_or_default())
    }
}

/// Follow-up line linking the flash evidence.
pub(crate) fn corroboration_text(flash: &FlashEvent, link_base_url: &str) -> String {
    format!(
        "{} - {} - <{}{}|link>",
        flash.player, flash.city, link_base_url, flash.image_ref
    )
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    fn name(&self) -> &str {
        "slack"
    }

    async fn announce(&self, event: &ChangeEvent) -> Result<Option<MessageRef>, NotifyError> {
        let text = event.message();
        self.post_message(&self.broadcast_channel, &text, None).await?;

        let channel = event.player.channel_name();
        let ts = self.post_message(&channel, &text, None).await?;
        Ok(Some(MessageRef { channel, ts }))
    }

    async fn corroborate(
        &self,
        primary: &MessageRef,
        flash: &FlashEvent,
    ) -> Result<(), NotifyError> {
        let text = corroboration_text(flash, &self.link_base_url);
        self.post_message(&primary.channel, &text, Some(&primary.ts))
            .await?;
        Ok(())
    }

    async fn provision(&self, player: &PlayerEntry) -> Result<(), NotifyError> {
        let payload = serde_json::json!({ "name": player.channel_name() });
        let response = self.call("conversations.create", payload).await?;
        if !response.ok {
            // The channel surviving from an earlier cycle is routine.
            if response.error.as_deref() == Some("name_taken") {
                tracing::debug!("slack channel for {} already exists", player.name);
                return Ok(());
            }
            return Err(NotifyError::Slack(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}
