//! Conversation-aware chat completion.
//!
//! A [`ChatClient`] answers messages within a conversation whose history is kept
//! in a [`ConversationStore`](crate::conversation::ConversationStore). Responses
//! withheld by the provider's content filter surface as a dedicated variant
//! rather than as an error.

mod openai;

pub use openai::OpenAIChatClient;

use crate::config::{ChatProvider, Settings};
use crate::conversation::{ChatMessage, ConversationId, ConversationStore, Role};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Outcome of a non-streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatAnswer {
    /// The model's answer.
    Text(String),
    /// The answer was withheld by the content filter.
    ContentFiltered,
}

/// One increment of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatDelta {
    Text(String),
    ContentFiltered,
}

/// Per-request completion parameters.
#[derive(Debug, Clone, Default)]
pub struct ChatParameters {
    /// Sampling temperature. None uses the client's default.
    pub temperature: Option<f32>,
}

impl ChatParameters {
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
        }
    }
}

/// Finite, non-restartable stream of completion increments.
pub type ChatDeltaStream = BoxStream<'static, Result<ChatDelta>>;

/// Trait for conversation-aware chat completion clients.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Check whether a conversation already has history.
    async fn conversation_exists(&self, id: ConversationId) -> Result<bool>;

    /// Set the system message of a conversation, replacing any previous one.
    async fn setup(&self, id: ConversationId, system_message: &str) -> Result<()>;

    /// Send a message within a conversation and wait for the full answer.
    ///
    /// When `add_to_history` is false the exchange is not recorded.
    async fn ask(
        &self,
        id: ConversationId,
        message: &str,
        parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatAnswer>;

    /// Send a message within a conversation and stream the answer.
    ///
    /// When `add_to_history` is true the exchange is recorded once the stream
    /// has been fully consumed, unless nothing but filtered content was produced.
    async fn ask_stream(
        &self,
        id: ConversationId,
        message: &str,
        parameters: &ChatParameters,
        add_to_history: bool,
    ) -> Result<ChatDeltaStream>;

    /// Append a question/answer pair to a conversation.
    async fn add_interaction(&self, id: ConversationId, question: &str, answer: &str) -> Result<()>;

    /// Delete all history of a conversation.
    async fn delete_conversation(&self, id: ConversationId) -> Result<()>;
}

/// Keep every system message plus the last `limit` other messages.
pub fn trim_history(messages: Vec<ChatMessage>, limit: usize) -> Vec<ChatMessage> {
    let (system, rest): (Vec<_>, Vec<_>) = messages
        .into_iter()
        .partition(|m| m.role == Role::System);

    let skip = rest.len().saturating_sub(limit);
    system.into_iter().chain(rest.into_iter().skip(skip)).collect()
}

/// Create the chat client selected in the settings.
pub fn create_chat_client(
    settings: &Settings,
    store: Arc<dyn ConversationStore>,
) -> Result<Arc<dyn ChatClient>> {
    let openai = &settings.openai;

    let client: Arc<dyn ChatClient> = match openai.provider {
        ChatProvider::OpenAI => Arc::new(OpenAIChatClient::new(
            crate::openai::create_client(openai)?,
            store,
            openai,
        )),
        ChatProvider::Azure => Arc::new(OpenAIChatClient::new(
            crate::openai::create_azure_client(openai)?,
            store,
            openai,
        )),
    };

    Ok(client)
}
