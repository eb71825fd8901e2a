//! Answer model: what a handler replies with, and the player-addressed form sent to a channel.

use serde::{Deserialize, Serialize};

/// Reply produced by a controller handler: free text plus ordered quick-reply suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerAnswer {
    pub text: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl ControllerAnswer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            suggestions: Vec::new(),
        }
    }

    /// Replace the suggestions; order is kept as given (it becomes button order).
    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Wire-ready answer for one player, handed to an [`AnswerChannel`](crate::channels::AnswerChannel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameAnswer {
    pub player_id: String,
    pub text: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl GameAnswer {
    pub fn for_player(player_id: impl Into<String>, answer: ControllerAnswer) -> Self {
        Self {
            player_id: player_id.into(),
            text: answer.text,
            suggestions: answer.suggestions,
        }
    }
}
