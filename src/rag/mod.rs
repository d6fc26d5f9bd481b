//! RAG (Retrieval-Augmented Generation) chat over the search index.
//!
//! Questions are rewritten into search queries, answered from highlighted
//! search results, and recorded in the caller's conversation.

pub mod context;
pub mod query;
mod service;

pub use context::format_context;
pub use query::{strip_quotes, QueryRewriter};
pub use service::{ChatRequest, ChatResponse, ChatService, ChatStream};

use crate::chat::create_chat_client;
use crate::config::{Prompts, Settings};
use crate::conversation::create_store;
use crate::error::Result;
use crate::search::{AzureSearchClient, SearchOptions};
use std::sync::Arc;

/// Build a chat service wired to the collaborators selected in the settings.
pub fn build_service(settings: &Settings) -> Result<ChatService> {
    let prompts = Prompts::load(
        settings.prompts.custom_dir.as_deref(),
        Some(&settings.prompts.variables),
    )?;

    let store = create_store(settings)?;
    let chat = create_chat_client(settings, store)?;
    let search = Arc::new(AzureSearchClient::from_settings(&settings.search)?);

    Ok(ChatService::new(
        chat,
        search,
        prompts,
        SearchOptions::from_settings(&settings.search),
    )
    .with_rewrite_with_history(settings.search.rewrite_with_history))
}
