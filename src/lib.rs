//! SearchGPT - conversational question answering over a search index
//!
//! Answers questions using only what an Azure AI Search index returns, while
//! keeping per-conversation history so follow-up questions make sense.
//!
//! # Overview
//!
//! For every message SearchGPT:
//! - Rewrites the message into a concise search query
//! - Retrieves highlighted fragments from the index
//! - Asks the chat model to answer from those fragments only
//! - Records the original message and the answer in the conversation
//!
//! # Architecture
//!
//! - `config` - Settings and prompt templates
//! - `conversation` - Conversation identifiers and history stores
//! - `chat` - Chat completion clients (OpenAI, Azure OpenAI)
//! - `search` - Search index clients (Azure AI Search)
//! - `rag` - Query rewriting, context assembly and the chat service
//! - `server` - HTTP API with server-sent events
//!
//! # Example
//!
//! ```rust,no_run
//! use searchgpt::config::Settings;
//! use searchgpt::conversation::ConversationId;
//! use searchgpt::rag::{build_service, ChatRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let service = build_service(&settings)?;
//!
//!     let id = ConversationId::new();
//!     let response = service
//!         .ask(&ChatRequest::new(id, "How do solar panels work?"))
//!         .await?;
//!     println!("{}", response.message);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod openai;
pub mod rag;
pub mod search;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Result, SearchGptError};
