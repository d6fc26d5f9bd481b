//! SQLite-based conversation store implementation.
//!
//! Keeps conversation history across restarts. Messages are stored one row per
//! message, ordered by their position in the conversation.

use super::{is_expired, ChatMessage, ConversationId, ConversationStore, Role};
use crate::error::{Result, SearchGptError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS messages (
        conversation_id TEXT NOT NULL,
        position INTEGER NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        PRIMARY KEY (conversation_id, position)
    );
"#;

/// SQLite-based conversation store.
pub struct SqliteConversationStore {
    conn: Mutex<Connection>,
    expiration: Duration,
}

impl SqliteConversationStore {
    /// Create a new SQLite conversation store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite conversation store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            expiration: Duration::minutes(60),
        })
    }

    /// Create an in-memory SQLite conversation store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
            expiration: Duration::minutes(60),
        })
    }

    /// Set the idle time after which a conversation expires.
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SearchGptError::Conversation(format!("Failed to acquire lock: {}", e)))
    }

    fn updated_at(conn: &Connection, id: &str) -> Result<Option<DateTime<Utc>>> {
        let value: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| SearchGptError::Conversation(format!("Invalid timestamp '{}': {}", s, e)))
            })
            .transpose()
    }

    /// Delete every conversation idle for longer than the expiration.
    fn purge_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = timestamp(now - self.expiration);
        conn.execute(
            "DELETE FROM messages WHERE conversation_id IN \
             (SELECT id FROM conversations WHERE updated_at < ?1)",
            params![cutoff],
        )?;
        let purged = conn.execute(
            "DELETE FROM conversations WHERE updated_at < ?1",
            params![cutoff],
        )?;
        Ok(purged)
    }

    /// Number of conversations currently stored, expired ones included.
    pub fn conversation_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn remove(conn: &Connection, id: &str) -> Result<()> {
        conn.execute("DELETE FROM messages WHERE conversation_id = ?1", params![id])?;
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Fixed-width UTC timestamp, so stored values order correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    #[instrument(skip(self))]
    async fn get(&self, id: ConversationId) -> Result<Vec<ChatMessage>> {
        let conn = self.lock()?;
        let key = id.to_string();
        let now = Utc::now();

        match Self::updated_at(&conn, &key)? {
            None => return Ok(Vec::new()),
            Some(last_access) if is_expired(last_access, self.expiration, now) => {
                debug!("Conversation {} expired", id);
                Self::remove(&conn, &key)?;
                return Ok(Vec::new());
            }
            Some(_) => {}
        }

        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(now), key],
        )?;

        let mut stmt = conn.prepare(
            "SELECT role, content FROM messages WHERE conversation_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content) = row?;
            messages.push(ChatMessage {
                role: role.parse::<Role>()?,
                content,
            });
        }

        Ok(messages)
    }

    #[instrument(skip(self, messages), fields(count = messages.len()))]
    async fn save(&self, id: ConversationId, messages: &[ChatMessage]) -> Result<()> {
        let conn = self.lock()?;
        let key = id.to_string();
        let now = Utc::now();

        let tx = conn.unchecked_transaction()?;

        let purged = self.purge_expired(&tx, now)?;
        if purged > 0 {
            debug!("Purged {} expired conversations", purged);
        }

        tx.execute("DELETE FROM messages WHERE conversation_id = ?1", params![key])?;
        tx.execute(
            "INSERT OR REPLACE INTO conversations (id, updated_at) VALUES (?1, ?2)",
            params![key, timestamp(now)],
        )?;

        for (position, message) in messages.iter().enumerate() {
            tx.execute(
                "INSERT INTO messages (conversation_id, position, role, content) VALUES (?1, ?2, ?3, ?4)",
                params![key, position as i64, message.role.as_str(), message.content],
            )?;
        }

        tx.commit()?;
        debug!("Saved {} messages for conversation {}", messages.len(), id);
        Ok(())
    }

    async fn exists(&self, id: ConversationId) -> Result<bool> {
        let conn = self.lock()?;
        let key = id.to_string();

        let Some(last_access) = Self::updated_at(&conn, &key)? else {
            return Ok(false);
        };
        if is_expired(last_access, self.expiration, Utc::now()) {
            return Ok(false);
        }

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![key],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: ConversationId) -> Result<()> {
        let conn = self.lock()?;
        Self::remove(&conn, &id.to_string())?;
        debug!("Deleted conversation {}", id);
        Ok(())
    }
}
