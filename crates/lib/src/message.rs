//! Per-turn inputs: the incoming message and a snapshot of who sent it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a message came from (channel connector and conversation within it).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub channel_id: String,
    pub conversation_id: String,
}

/// One inbound turn's text. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    pub text: String,
    #[serde(default)]
    pub sender: Sender,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::default(),
            received_at: Utc::now(),
        }
    }

    pub fn from_sender(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            sender,
            ..Self::new(text)
        }
    }
}

/// Read-only player snapshot for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub key: String,
    pub locale: String,
}

impl PlayerInfo {
    pub fn new(key: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            locale: locale.into(),
        }
    }
}
