//! Channel registry: register channels by id and route answers by player key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::inbound::split_player_key;
use super::{AnswerChannel, ChannelError};
use crate::answer::GameAnswer;

/// Registry of channel ids to channels. Shared across the server.
///
/// As an [`AnswerChannel`] it forwards each answer to the channel named by the player key's
/// prefix, rewriting the recipient to the bare conversation id.
pub struct ChannelRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<dyn AnswerChannel>>>>,
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, id: impl Into<String>, channel: Arc<dyn AnswerChannel>) {
        let id = id.into();
        if self.inner.write().await.insert(id.clone(), channel).is_some() {
            log::debug!("channel {} re-registered", id);
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn AnswerChannel>> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn ids(&self) -> Vec<String> {
        self.inner.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl AnswerChannel for ChannelRegistry {
    async fn answer(&self, answer: GameAnswer) -> Result<(), ChannelError> {
        let GameAnswer {
            player_id,
            text,
            suggestions,
        } = answer;
        let (channel_id, conversation_id) = split_player_key(&player_id)
            .ok_or_else(|| ChannelError::UnknownChannel(player_id.clone()))?;
        let channel = self
            .get(channel_id)
            .await
            .ok_or_else(|| ChannelError::UnknownChannel(player_id.clone()))?;
        let routed = GameAnswer {
            player_id: conversation_id.to_string(),
            text,
            suggestions,
        };
        channel.answer(routed).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<GameAnswer>>,
    }

    #[async_trait]
    impl AnswerChannel for Recorder {
        async fn answer(&self, answer: GameAnswer) -> Result<(), ChannelError> {
            self.sent.lock().await.push(answer);
            Ok(())
        }
    }

    fn answer_for(player: &str) -> GameAnswer {
        GameAnswer {
            player_id: player.to_string(),
            text: "hi".to_string(),
            suggestions: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[tokio::test]
    async fn routes_by_player_key_prefix() {
        let registry = ChannelRegistry::new();
        let telegram = Arc::new(Recorder::default());
        let console = Arc::new(Recorder::default());
        registry.register("telegram", telegram.clone()).await;
        registry.register("console", console.clone()).await;

        registry.answer(answer_for("telegram:42")).await.unwrap();

        let sent = telegram.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].player_id, "42");
        assert_eq!(sent[0].text, "hi");
        assert_eq!(sent[0].suggestions, vec!["a", "b"]);
        assert!(console.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let registry = ChannelRegistry::new();
        let err = registry.answer(answer_for("matrix:1")).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel(_)));
        let err = registry.answer(answer_for("no-prefix")).await.unwrap_err();
        assert!(matches!(err, ChannelError::UnknownChannel(_)));
    }
}
