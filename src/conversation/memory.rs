//! In-memory conversation store implementation.
//!
//! Conversations live as long as the process and expire after a period of inactivity.

use super::{is_expired, ChatMessage, ConversationId, ConversationStore};
use crate::error::{Result, SearchGptError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Default idle time before a conversation is dropped.
const DEFAULT_EXPIRATION_MINUTES: i64 = 60;

struct Entry {
    messages: Vec<ChatMessage>,
    last_access: DateTime<Utc>,
}

/// In-memory conversation store.
pub struct MemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Entry>>,
    expiration: Duration,
}

impl MemoryConversationStore {
    /// Create a new in-memory conversation store.
    pub fn new() -> Self {
        Self::with_expiration(Duration::minutes(DEFAULT_EXPIRATION_MINUTES))
    }

    /// Create a store whose conversations expire after `expiration` of inactivity.
    pub fn with_expiration(expiration: Duration) -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            expiration,
        }
    }

    /// Number of conversations currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.conversations.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_error<E: std::fmt::Display>(e: E) -> SearchGptError {
    SearchGptError::Conversation(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn get(&self, id: ConversationId) -> Result<Vec<ChatMessage>> {
        let mut conversations = self.conversations.write().map_err(lock_error)?;
        let now = Utc::now();

        match conversations.get_mut(&id) {
            None => return Ok(Vec::new()),
            Some(entry) if !is_expired(entry.last_access, self.expiration, now) => {
                entry.last_access = now;
                return Ok(entry.messages.clone());
            }
            Some(_) => {}
        }

        debug!("Conversation {} expired", id);
        conversations.remove(&id);
        Ok(Vec::new())
    }

    async fn save(&self, id: ConversationId, messages: &[ChatMessage]) -> Result<()> {
        let mut conversations = self.conversations.write().map_err(lock_error)?;
        let now = Utc::now();

        let before = conversations.len();
        conversations.retain(|_, entry| !is_expired(entry.last_access, self.expiration, now));
        if conversations.len() < before {
            debug!("Purged {} expired conversations", before - conversations.len());
        }

        conversations.insert(
            id,
            Entry {
                messages: messages.to_vec(),
                last_access: now,
            },
        );
        Ok(())
    }

    async fn exists(&self, id: ConversationId) -> Result<bool> {
        let conversations = self.conversations.read().map_err(lock_error)?;
        Ok(conversations.get(&id).is_some_and(|entry| {
            !entry.messages.is_empty() && !is_expired(entry.last_access, self.expiration, Utc::now())
        }))
    }

    async fn delete(&self, id: ConversationId) -> Result<()> {
        let mut conversations = self.conversations.write().map_err(lock_error)?;
        conversations.remove(&id);
        Ok(())
    }
}
