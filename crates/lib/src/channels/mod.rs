//! Communication channels: where inbound messages come from and answers go to.
//!
//! [`AnswerChannel`] is the outbound boundary the dispatcher talks to. The
//! [`ChannelRegistry`] routes answers to the connector named by the player key prefix.

mod inbound;
mod registry;
mod telegram;

pub use inbound::{player_key, split_player_key, InboundMessage};
pub use registry::ChannelRegistry;
pub use telegram::{TelegramChannel, TelegramUpdate, TELEGRAM_CHANNEL_ID};

use async_trait::async_trait;

use crate::answer::GameAnswer;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel api error: {0}")]
    Api(String),
    #[error("no channel registered for recipient {0}")]
    UnknownChannel(String),
    #[error("channel not configured: {0}")]
    NotConfigured(String),
}

/// Delivers answers to players.
#[async_trait]
pub trait AnswerChannel: Send + Sync {
    async fn answer(&self, answer: GameAnswer) -> Result<(), ChannelError>;
}
