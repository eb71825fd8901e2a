//! Per-player session state: the navigation stack plus free-form game values.
//!
//! Sessions are keyed by player key and persisted between turns by a [`SessionRepository`].
//! The dispatcher only reads the navigation top; handlers return an updated copy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Controller names the player has entered, bottom to top. The top is the active controller;
/// an empty stack means the registry's main controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationStack(Vec<String>);

impl NavigationStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn peek(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn push(&mut self, controller: impl Into<String>) {
        self.0.push(controller.into());
    }

    pub fn pop(&mut self) -> Option<String> {
        self.0.pop()
    }

    /// Swap the active controller without growing the stack. Pushes when empty.
    pub fn replace_top(&mut self, controller: impl Into<String>) {
        self.0.pop();
        self.0.push(controller.into());
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for NavigationStack {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Session document for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    pub player_key: String,
    #[serde(default)]
    pub navigation: NavigationStack,
    /// Game-specific values (inventory, counters, ...). Opaque to the dispatcher.
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(player_key: impl Into<String>) -> Self {
        Self {
            player_key: player_key.into(),
            navigation: NavigationStack::new(),
            values: serde_json::Map::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(String),
}

/// Persistence boundary for session documents.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, player_key: &str) -> Result<Option<SessionData>, SessionError>;
    async fn save(&self, session: &SessionData) -> Result<(), SessionError>;
}

/// In-memory session store keyed by player key.
pub struct InMemorySessionStore {
    inner: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Drop a player's session; returns true if one existed.
    pub async fn remove(&self, player_key: &str) -> bool {
        self.inner.write().await.remove(player_key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn load(&self, player_key: &str) -> Result<Option<SessionData>, SessionError> {
        Ok(self.inner.read().await.get(player_key).cloned())
    }

    async fn save(&self, session: &SessionData) -> Result<(), SessionError> {
        self.inner
            .write()
            .await
            .insert(session.player_key.clone(), session.clone());
        Ok(())
    }
}
