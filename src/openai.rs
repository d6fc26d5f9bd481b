//! OpenAI client configuration with sensible defaults.

use crate::config::OpenAISettings;
use crate::error::{Result, SearchGptError};
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::Client;
use std::time::Duration;

/// Create an OpenAI client with the configured timeout.
///
/// The API key is read from `OPENAI_API_KEY`.
pub fn create_client(settings: &OpenAISettings) -> Result<Client<OpenAIConfig>> {
    create_client_with_config(
        OpenAIConfig::default(),
        Duration::from_secs(settings.timeout_secs),
    )
}

/// Create an Azure OpenAI client for the configured deployment.
///
/// The API key is read from `AZURE_OPENAI_API_KEY`.
pub fn create_azure_client(settings: &OpenAISettings) -> Result<Client<AzureConfig>> {
    let api_base = settings.azure_api_base.as_deref().ok_or_else(|| {
        SearchGptError::Config("openai.azure_api_base is required for the azure provider".to_string())
    })?;
    let deployment = settings.azure_deployment.as_deref().ok_or_else(|| {
        SearchGptError::Config("openai.azure_deployment is required for the azure provider".to_string())
    })?;
    let api_key = std::env::var("AZURE_OPENAI_API_KEY")
        .map_err(|_| SearchGptError::Config("AZURE_OPENAI_API_KEY not set".to_string()))?;

    let config = AzureConfig::new()
        .with_api_base(api_base)
        .with_deployment_id(deployment)
        .with_api_version(&settings.azure_api_version)
        .with_api_key(api_key);

    create_client_with_config(config, Duration::from_secs(settings.timeout_secs))
}

/// Create a client for any provider configuration with a custom timeout.
pub fn create_client_with_config<C: Config>(config: C, timeout: Duration) -> Result<Client<C>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SearchGptError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
