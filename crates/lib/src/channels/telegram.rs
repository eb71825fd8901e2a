//! Telegram channel: long-poll getUpdates for inbound turns and sendMessage (with a reply
//! keyboard built from the suggestions) for answers.

use crate::answer::GameAnswer;
use crate::channels::inbound::InboundMessage;
use crate::channels::{AnswerChannel, ChannelError};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const TELEGRAM_CHANNEL_ID: &str = "telegram";

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

/// Telegram update payload (getUpdates result item).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramUser {
    #[serde(default)]
    pub language_code: Option<String>,
}

impl TelegramUpdate {
    /// Text messages become inbound turns; everything else is skipped.
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let msg = self.message?;
        let text = msg.text?;
        Some(InboundMessage {
            channel_id: TELEGRAM_CHANNEL_ID.to_string(),
            conversation_id: msg.chat.id.to_string(),
            text,
            locale: msg.from.and_then(|u| u.language_code),
        })
    }
}

/// Telegram channel connector.
pub struct TelegramChannel {
    token: Option<String>,
    api_base: String,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            api_base: telegram_api_base(),
            running: AtomicBool::new(false),
            client: reqwest::Client::new(),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn method_url(&self, method: &str) -> Result<String, ChannelError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured("telegram bot token".to_string()))?;
        Ok(format!("{}/bot{}/{}", self.api_base, token, method))
    }

    /// Start the getUpdates long-poll loop and forward messages to the server. Returns a handle to await on shutdown.
    pub fn start_inbound(self: Arc<Self>, inbound_tx: mpsc::Sender<InboundMessage>) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), ChannelError> {
        let url = format!("{}?timeout={}", self.method_url("getUpdates")?, LONG_POLL_TIMEOUT);
        let url = if let Some(off) = offset {
            format!("{}&offset={}", url, off)
        } else {
            url
        };
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("getUpdates failed: {} {}", status, body)));
        }
        let data: GetUpdatesResponse = res.json().await?;
        if !data.ok {
            return Err(ChannelError::Api("getUpdates returned ok: false".to_string()));
        }
        let next_offset = data.result.iter().map(|u| u.update_id).max().map(|id| id + 1);
        Ok((data.result, next_offset))
    }

    /// Send a text message to a chat via sendMessage, with suggestions as a reply keyboard.
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        suggestions: &[String],
    ) -> Result<(), ChannelError> {
        let url = self.method_url("sendMessage")?;
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_markup(suggestions),
        });
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("sendMessage failed: {} {}", status, body)));
        }
        Ok(())
    }
}

/// One button per row, in suggestion order; no suggestions removes any previous keyboard.
fn reply_markup(suggestions: &[String]) -> serde_json::Value {
    if suggestions.is_empty() {
        return serde_json::json!({ "remove_keyboard": true });
    }
    let rows: Vec<serde_json::Value> = suggestions
        .iter()
        .map(|s| serde_json::json!([{ "text": s }]))
        .collect();
    serde_json::json!({
        "keyboard": rows,
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

async fn run_get_updates_loop(channel: Arc<TelegramChannel>, inbound_tx: mpsc::Sender<InboundMessage>) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                offset = next.or(offset);
                for inbound in updates.into_iter().filter_map(TelegramUpdate::into_inbound) {
                    if inbound_tx.send(inbound).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::debug!("telegram getUpdates error: {}", e);
                tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl AnswerChannel for TelegramChannel {
    /// `answer.player_id` is the bare chat id (the registry strips the `telegram:` prefix).
    async fn answer(&self, answer: GameAnswer) -> Result<(), ChannelError> {
        self.send_message(&answer.player_id, &answer.text, &answer.suggestions)
            .await
    }
}

/// Telegram bot API base URL; `TELEGRAM_API_BASE` overrides it (self-hosted Bot API server).
pub fn telegram_api_base() -> String {
    std::env::var("TELEGRAM_API_BASE")
        .ok()
        .map(|s| s.trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| TELEGRAM_API_BASE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_with_text_becomes_inbound() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 7,
            "message": {
                "chat": { "id": 42 },
                "from": { "id": 1, "language_code": "ru" },
                "text": "старт"
            }
        }))
        .unwrap();
        let inbound = update.into_inbound().unwrap();
        assert_eq!(inbound.player_key(), "telegram:42");
        assert_eq!(inbound.locale.as_deref(), Some("ru"));
        assert_eq!(inbound.text, "старт");
    }

    #[test]
    fn update_without_text_is_skipped() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 8,
            "message": { "chat": { "id": 42 } }
        }))
        .unwrap();
        assert!(update.into_inbound().is_none());
    }

    #[test]
    fn keyboard_keeps_suggestion_order() {
        let markup = reply_markup(&["Play".to_string(), "Help".to_string()]);
        assert_eq!(markup["keyboard"][0][0]["text"], "Play");
        assert_eq!(markup["keyboard"][1][0]["text"], "Help");
        assert_eq!(reply_markup(&[])["remove_keyboard"], true);
    }

    #[tokio::test]
    async fn send_without_token_is_not_configured() {
        let channel = TelegramChannel::new(None);
        let err = channel.send_message("1", "hi", &[]).await.unwrap_err();
        assert!(matches!(err, ChannelError::NotConfigured(_)));
    }

    #[test]
    fn api_base_override_is_used_for_method_urls() {
        std::env::set_var("TELEGRAM_API_BASE", "http://127.0.0.1:8081/");
        let channel = TelegramChannel::new(Some("T".to_string()));
        std::env::remove_var("TELEGRAM_API_BASE");
        assert_eq!(
            channel.method_url("getUpdates").unwrap(),
            "http://127.0.0.1:8081/botT/getUpdates"
        );
        assert_eq!(telegram_api_base(), TELEGRAM_API_BASE);
    }
}
