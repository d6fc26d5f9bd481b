//! Error types for SearchGPT.

use thiserror::Error;

/// Library-level error type for SearchGPT operations.
#[derive(Error, Debug)]
pub enum SearchGptError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Conversation store error: {0}")]
    Conversation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for SearchGPT operations.
pub type Result<T> = std::result::Result<T, SearchGptError>;
