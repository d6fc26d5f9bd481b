//! Pre-flight checks before contacting the upstream services.
//!
//! Validates that credentials and required settings are present so a
//! command fails up front instead of on its first request.

use crate::config::{ChatProvider, Settings};
use crate::error::{Result, SearchGptError};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Answering questions needs the chat provider and the search index.
    Ask,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ask => {
            check_chat_provider(settings)?;
            check_search(settings)?;
        }
    }
    Ok(())
}

/// Check the credentials and settings of the configured chat provider.
pub fn check_chat_provider(settings: &Settings) -> Result<()> {
    match settings.openai.provider {
        ChatProvider::OpenAI => check_env("OPENAI_API_KEY"),
        ChatProvider::Azure => {
            if settings.openai.azure_api_base.is_none() {
                return Err(SearchGptError::Config(
                    "openai.azure_api_base is not set".to_string(),
                ));
            }
            if settings.openai.azure_deployment.is_none() {
                return Err(SearchGptError::Config(
                    "openai.azure_deployment is not set".to_string(),
                ));
            }
            check_env("AZURE_OPENAI_API_KEY")
        }
    }
}

/// Check that the search index is addressable and a key is available.
pub fn check_search(settings: &Settings) -> Result<()> {
    let search = &settings.search;
    if search.index_name.is_empty() {
        return Err(SearchGptError::Config(
            "search.index_name is not set".to_string(),
        ));
    }
    if search.service_name.is_empty() && search.endpoint.is_none() {
        return Err(SearchGptError::Config(
            "search.service_name or search.endpoint must be set".to_string(),
        ));
    }
    check_env("AZURE_SEARCH_API_KEY")
}

fn check_env(name: &str) -> Result<()> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(()),
        Ok(_) => Err(SearchGptError::Config(format!(
            "{} is empty. Set it with: export {}='...'",
            name, name
        ))),
        Err(_) => Err(SearchGptError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            name, name
        ))),
    }
}
