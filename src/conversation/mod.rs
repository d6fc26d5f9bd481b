//! Conversation history storage.
//!
//! Conversations are identified by a [`ConversationId`] and hold the ordered
//! messages exchanged so far. Stores apply a sliding expiration: a conversation
//! that has not been touched for longer than the configured window reads as absent.

mod memory;
mod sqlite;

pub use memory::MemoryConversationStore;
pub use sqlite::SqliteConversationStore;

use crate::config::Settings;
use crate::error::{Result, SearchGptError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Opaque identifier of a logical conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generate a new random conversation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConversationId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for ConversationId {
    type Err = SearchGptError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| SearchGptError::InvalidInput(format!("Invalid conversation ID '{}': {}", s, e)))
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = SearchGptError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(SearchGptError::Conversation(format!("Unknown message role: {}", s))),
        }
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Trait for conversation store implementations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Get the messages of a conversation, refreshing its expiration.
    ///
    /// Unknown and expired conversations yield an empty list.
    async fn get(&self, id: ConversationId) -> Result<Vec<ChatMessage>>;

    /// Replace the messages of a conversation.
    async fn save(&self, id: ConversationId, messages: &[ChatMessage]) -> Result<()>;

    /// Check whether a conversation has any (unexpired) history.
    async fn exists(&self, id: ConversationId) -> Result<bool>;

    /// Delete a conversation. Deleting an unknown conversation is not an error.
    async fn delete(&self, id: ConversationId) -> Result<()>;
}

/// Whether a conversation last touched at `last_access` has outlived `expiration`.
pub(crate) fn is_expired(last_access: DateTime<Utc>, expiration: Duration, now: DateTime<Utc>) -> bool {
    now - last_access > expiration
}

/// Create the conversation store selected in the settings.
pub fn create_store(settings: &Settings) -> Result<Arc<dyn ConversationStore>> {
    let expiration = Duration::seconds(settings.openai.message_expiration_secs as i64);

    match settings.conversation.provider.as_str() {
        "memory" => {
            info!("Using in-memory conversation store");
            Ok(Arc::new(MemoryConversationStore::with_expiration(expiration)))
        }
        "sqlite" => Ok(Arc::new(
            SqliteConversationStore::new(&settings.sqlite_path())?.with_expiration(expiration),
        )),
        other => Err(SearchGptError::Config(format!(
            "Unknown conversation store provider: {}",
            other
        ))),
    }
}
