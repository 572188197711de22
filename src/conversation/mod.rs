//! Conversation types and the append-only turn log

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    User,
    Assistant,
}

/// One message in the conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub content: String,
    pub origin: Origin,
    pub created_at: DateTime<Utc>,
    /// Screenshot that was captured for this exchange, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<PathBuf>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Origin::User, content.into(), None)
    }

    pub fn assistant(content: impl Into<String>, attachment: Option<PathBuf>) -> Self {
        Self::new(Origin::Assistant, content.into(), attachment)
    }

    fn new(origin: Origin, content: String, attachment: Option<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            origin,
            created_at: Utc::now(),
            attachment,
        }
    }
}

/// Ordered log of turns for the lifetime of a session.
///
/// Writers take the lock for the duration of a push; readers get an owned
/// snapshot and never observe a half-written log.
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: RwLock<Vec<Turn>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return a copy of it
    pub async fn append(&self, turn: Turn) -> Turn {
        let mut turns = self.turns.write().await;
        turns.push(turn.clone());
        turn
    }

    pub async fn snapshot(&self) -> Vec<Turn> {
        self.turns.read().await.clone()
    }
}
