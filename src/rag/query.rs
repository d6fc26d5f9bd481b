//! Search query derivation from free-form questions.

use crate::chat::{ChatAnswer, ChatClient, ChatParameters};
use crate::config::Prompts;
use crate::conversation::ConversationId;
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Turns user messages into concise search queries with a deterministic completion.
pub struct QueryRewriter {
    chat: Arc<dyn ChatClient>,
    prompts: Arc<Prompts>,
}

impl QueryRewriter {
    pub fn new(chat: Arc<dyn ChatClient>, prompts: Arc<Prompts>) -> Self {
        Self { chat, prompts }
    }

    /// Derive a search query from `message`.
    ///
    /// With a conversation ID the rewrite sees that conversation's history;
    /// otherwise it runs in a throwaway conversation. Nothing is recorded either way.
    #[instrument(skip(self, message))]
    pub async fn rewrite(&self, conversation: Option<ConversationId>, message: &str) -> Result<String> {
        let prompt = self.prompts.query_rewrite(message);
        let id = conversation.unwrap_or_default();

        let answer = self
            .chat
            .ask(id, &prompt, &ChatParameters::with_temperature(0.0), false)
            .await?;

        let query = match answer {
            ChatAnswer::Text(text) => strip_quotes(text.trim()).to_string(),
            ChatAnswer::ContentFiltered => {
                warn!("Query rewrite was content filtered, searching with the raw message");
                message.to_string()
            }
        };

        debug!("Search query: {}", query);
        Ok(query)
    }
}

/// Remove one pair of surrounding double quotes.
pub fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
