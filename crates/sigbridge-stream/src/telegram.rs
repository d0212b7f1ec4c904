//! Telegram channel-post source — long polling via the Bot API.
//!
//! `connect` validates the bot credential (`getMe`), `subscribe` resolves
//! the monitored channel (`getChat`), and `next_message` drains `getUpdates`
//! one post at a time. Transport failures are classified into the
//! supervisor's fault taxonomy; this module never retries on its own.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use sigbridge_core::config::TelegramConfig;
use sigbridge_core::traits::StreamSource;
use sigbridge_core::types::{InboundMessage, StreamFault};

pub struct TelegramSource {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: i64,
    pending: VecDeque<InboundMessage>,
}

impl TelegramSource {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            last_update_id: 0,
            pending: VecDeque::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    async fn get_me(&self) -> Result<BotUser, StreamFault> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .send()
            .await
            .map_err(transport_fault)?;
        let body: ApiResponse<BotUser> = decode(response).await?;
        body.into_result()
    }

    async fn get_chat(&self) -> Result<Chat, StreamFault> {
        let response = self
            .client
            .get(self.api_url("getChat"))
            .query(&[("chat_id", self.config.channel_id.to_string())])
            .timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .send()
            .await
            .map_err(transport_fault)?;
        let body: ApiResponse<Chat> = decode(response).await?;
        body.into_result()
    }

    async fn get_updates(&mut self) -> Result<Vec<Update>, StreamFault> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", self.config.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\",\"channel_post\"]".into()),
            ])
            // Must outlive the server-side long-poll window.
            .timeout(Duration::from_secs(self.config.poll_timeout_secs + 10))
            .send()
            .await
            .map_err(transport_fault)?;
        let body: ApiResponse<Vec<Update>> = decode(response).await?;
        let updates = body.into_result()?;

        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }
}

#[async_trait]
impl StreamSource for TelegramSource {
    async fn connect(&mut self) -> Result<(), StreamFault> {
        let me = self.get_me().await?;
        tracing::info!(
            "✅ Telegram bot connected: @{}",
            me.username.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), StreamFault> {
        let chat = self.get_chat().await?;
        tracing::info!(
            "📢 monitoring channel: {} ({})",
            chat.title.as_deref().unwrap_or("untitled"),
            chat.id
        );
        Ok(())
    }

    async fn next_message(&mut self) -> Result<InboundMessage, StreamFault> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(message);
            }
            let updates = self.get_updates().await?;
            for update in updates {
                if let Some(inbound) = update.into_inbound(self.config.channel_id) {
                    self.pending.push_back(inbound);
                }
            }
        }
    }

    async fn disconnect(&mut self) {
        // Long polling holds no server-side session; dropping the offset
        // cursor is all a teardown means. Pending messages die with the
        // subscription.
        self.pending.clear();
        tracing::info!("👋 Telegram source disconnected");
    }
}

fn transport_fault(e: reqwest::Error) -> StreamFault {
    if e.is_timeout() {
        StreamFault::Retryable("request timed out".into())
    } else {
        StreamFault::Retryable(format!("transport error: {e}"))
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<ApiResponse<T>, StreamFault> {
    response
        .json()
        .await
        .map_err(|e| StreamFault::Retryable(format!("invalid Telegram response: {e}")))
}

/// Map a Bot API error to the supervisor's fault taxonomy. An invalidated
/// credential cannot be fixed by retrying; a flood wait carries the
/// server-mandated pause; everything else is worth another attempt.
fn api_fault(error_code: Option<i64>, description: Option<&str>, retry_after: Option<u64>) -> StreamFault {
    let description = description.unwrap_or("no description").to_string();
    match error_code {
        Some(401) | Some(404) => StreamFault::Fatal(format!("credential rejected: {description}")),
        Some(420) | Some(429) => StreamFault::RateLimited {
            retry_after_secs: retry_after.unwrap_or(5),
        },
        _ => StreamFault::Retryable(format!("Telegram API error: {description}")),
    }
}

// --- Bot API types ---

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
    parameters: Option<ResponseParameters>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, StreamFault> {
        if !self.ok {
            return Err(api_fault(
                self.error_code,
                self.description.as_deref(),
                self.parameters.and_then(|p| p.retry_after),
            ));
        }
        self.result
            .ok_or_else(|| StreamFault::Retryable("empty Telegram result".into()))
    }
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
    channel_post: Option<TgMessage>,
}

impl Update {
    /// Keep posts from the monitored channel, textless ones included — the
    /// supervisor decides what to skip.
    fn into_inbound(self, channel_id: i64) -> Option<InboundMessage> {
        let message = self.channel_post.or(self.message)?;
        if message.chat.id != channel_id {
            return None;
        }
        Some(InboundMessage {
            text: message.text,
            arrived_at: DateTime::from_timestamp(message.date, 0).unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: Chat,
    text: Option<String>,
    date: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_unauthorized_is_fatal() {
        assert!(matches!(
            api_fault(Some(401), Some("Unauthorized"), None),
            StreamFault::Fatal(_)
        ));
    }

    #[test]
    fn test_flood_wait_carries_server_duration() {
        assert_eq!(
            api_fault(Some(429), Some("Too Many Requests"), Some(17)),
            StreamFault::RateLimited {
                retry_after_secs: 17
            }
        );
        // Missing retry_after still waits a little rather than hammering.
        assert_eq!(
            api_fault(Some(429), None, None),
            StreamFault::RateLimited { retry_after_secs: 5 }
        );
    }

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(matches!(
            api_fault(Some(502), Some("Bad Gateway"), None),
            StreamFault::Retryable(_)
        ));
        assert!(matches!(api_fault(None, None, None), StreamFault::Retryable(_)));
    }

    #[test]
    fn test_channel_post_conversion() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 42,
            "channel_post": {
                "message_id": 7,
                "chat": {"id": -1003193908746_i64, "type": "channel", "title": "Signals"},
                "text": "12:30 S",
                "date": 1767258000
            }
        }))
        .unwrap();

        let inbound = update.into_inbound(-1003193908746).unwrap();
        assert_eq!(inbound.text.as_deref(), Some("12:30 S"));
        assert_eq!(inbound.arrived_at.minute(), 0);
    }

    #[test]
    fn test_other_chats_are_dropped() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 43,
            "message": {
                "message_id": 8,
                "chat": {"id": 555, "type": "private"},
                "text": "B",
                "date": 1767258000
            }
        }))
        .unwrap();
        assert!(update.into_inbound(-1003193908746).is_none());
    }

    #[test]
    fn test_textless_posts_survive_conversion() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 44,
            "channel_post": {
                "message_id": 9,
                "chat": {"id": -100, "type": "channel"},
                "date": 1767258000
            }
        }))
        .unwrap();
        let inbound = update.into_inbound(-100).unwrap();
        assert!(inbound.text.is_none());
    }
}
