//! Configuration module for SearchGPT.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ChatPrompts, Prompts};
pub use settings::{
    ChatProvider, ConversationSettings, GeneralSettings, OpenAISettings, PromptSettings,
    SearchSettings, ServerSettings, Settings,
};
