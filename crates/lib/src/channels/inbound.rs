//! Inbound message from a channel connector, before it becomes a dispatcher turn.

use crate::message::{IncomingMessage, Sender};

/// A message from a channel, to be turned into one dispatch turn for the sending player.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub channel_id: String,
    pub conversation_id: String,
    pub text: String,
    /// Language reported by the channel (e.g. Telegram `language_code`), if any.
    pub locale: Option<String>,
}

impl InboundMessage {
    pub fn player_key(&self) -> String {
        player_key(&self.channel_id, &self.conversation_id)
    }

    pub fn to_incoming(&self) -> IncomingMessage {
        IncomingMessage::from_sender(
            self.text.clone(),
            Sender {
                channel_id: self.channel_id.clone(),
                conversation_id: self.conversation_id.clone(),
            },
        )
    }
}

/// Player key for a channel conversation: `<channel_id>:<conversation_id>`.
pub fn player_key(channel_id: &str, conversation_id: &str) -> String {
    format!("{}:{}", channel_id, conversation_id)
}

/// Inverse of [`player_key`]. Splits at the first `:`.
pub fn split_player_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(':')
        .filter(|(channel, conv)| !channel.is_empty() && !conv.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_key_round_trips_through_split() {
        let key = player_key("telegram", "-100:42");
        assert_eq!(key, "telegram:-100:42");
        assert_eq!(split_player_key(&key), Some(("telegram", "-100:42")));
    }

    #[test]
    fn split_rejects_keys_without_both_parts() {
        assert_eq!(split_player_key("telegram"), None);
        assert_eq!(split_player_key(":1"), None);
        assert_eq!(split_player_key("telegram:"), None);
    }

    #[test]
    fn to_incoming_carries_sender() {
        let msg = InboundMessage {
            channel_id: "console".to_string(),
            conversation_id: "me".to_string(),
            text: "start".to_string(),
            locale: None,
        };
        let incoming = msg.to_incoming();
        assert_eq!(incoming.text, "start");
        assert_eq!(incoming.sender.channel_id, "console");
        assert_eq!(msg.player_key(), "console:me");
    }
}
