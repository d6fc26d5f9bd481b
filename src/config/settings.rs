//! Configuration settings for SearchGPT.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub openai: OpenAISettings,
    pub search: SearchSettings,
    pub conversation: ConversationSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Application name shown in interactive output.
    pub application_name: String,
    /// Short description of the application.
    pub application_description: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            application_name: "SearchGPT".to_string(),
            application_description: "Chat with your search index".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Chat completion provider type.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ChatProvider {
    /// api.openai.com (default).
    #[default]
    OpenAI,
    /// Azure OpenAI Service deployment.
    Azure,
}

impl std::str::FromStr for ChatProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ChatProvider::OpenAI),
            "azure" | "azureopenai" => Ok(ChatProvider::Azure),
            _ => Err(format!("Unknown chat provider: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatProvider::OpenAI => write!(f, "openai"),
            ChatProvider::Azure => write!(f, "azure"),
        }
    }
}

/// Chat completion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Provider (openai, azure).
    pub provider: ChatProvider,
    /// Model name (OpenAI) used for every completion.
    pub model: String,
    /// Sampling temperature for answers. Query rewriting always uses 0.
    pub temperature: f32,
    /// HTTP timeout for completion requests, in seconds.
    pub timeout_secs: u64,
    /// Azure resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub azure_api_base: Option<String>,
    /// Azure deployment name.
    pub azure_deployment: Option<String>,
    /// Azure OpenAI REST API version.
    pub azure_api_version: String,
    /// Maximum number of messages kept per conversation (system message excluded).
    pub message_limit: usize,
    /// Idle time after which a conversation is forgotten, in seconds.
    pub message_expiration_secs: u64,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            provider: ChatProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 300,
            azure_api_base: None,
            azure_deployment: None,
            azure_api_version: "2024-06-01".to_string(),
            message_limit: 10,
            message_expiration_secs: 3600,
        }
    }
}

/// Search service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Azure AI Search service name (`{name}.search.windows.net`).
    pub service_name: String,
    /// Index to query.
    pub index_name: String,
    /// Search REST API version.
    pub api_version: String,
    /// Full endpoint override; takes precedence over `service_name`.
    pub endpoint: Option<String>,
    /// The only field projected from matching documents.
    pub selected_field: String,
    /// Field whose highlighted fragments feed the context.
    pub highlight_field: String,
    /// Highlight fragment setting appended to the field (`content-10`).
    pub highlight_fragment_size: u32,
    /// Maximum number of documents to retrieve. None lets the service decide.
    pub top: Option<u32>,
    /// Rewrite the query against the caller's conversation history.
    pub rewrite_with_history: bool,
    /// HTTP timeout for search requests, in seconds.
    pub timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            service_name: String::new(),
            index_name: String::new(),
            api_version: "2023-11-01".to_string(),
            endpoint: None,
            selected_field: "content".to_string(),
            highlight_field: "content".to_string(),
            highlight_fragment_size: 10,
            top: None,
            rewrite_with_history: false,
            timeout_secs: 30,
        }
    }
}

/// Conversation store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// Store provider (memory, sqlite).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            sqlite_path: "~/.searchgpt/conversations.db".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SearchGptError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("searchgpt")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.conversation.sqlite_path)
    }
}
