//! Azure AI Search client over the REST API.

use super::{SearchClient, SearchHit, SearchOptions};
use crate::config::SearchSettings;
use crate::error::{Result, SearchGptError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Azure AI Search client for a single index.
pub struct AzureSearchClient {
    http: reqwest::Client,
    search_url: Url,
    api_key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    search: &'a str,
    select: String,
    highlight: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    top: Option<u32>,
}

#[derive(Deserialize)]
struct SearchResponse {
    value: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "@search.score", default)]
    score: f64,
    #[serde(rename = "@search.highlights", default)]
    highlights: Option<HashMap<String, Vec<String>>>,
    #[serde(flatten)]
    fields: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

impl AzureSearchClient {
    /// Create a client for `index` on the service at `endpoint`.
    pub fn new(
        endpoint: &str,
        index: &str,
        api_key: impl Into<String>,
        api_version: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base = Url::parse(endpoint)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut search_url = base.join(&format!("indexes/{}/docs/search", index))?;
        search_url
            .query_pairs_mut()
            .append_pair("api-version", api_version);

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            search_url,
            api_key: api_key.into(),
        })
    }

    /// Create a client from settings. The API key is read from `AZURE_SEARCH_API_KEY`.
    pub fn from_settings(settings: &SearchSettings) -> Result<Self> {
        if settings.index_name.is_empty() {
            return Err(SearchGptError::Config("search.index_name is not set".to_string()));
        }

        let endpoint = match &settings.endpoint {
            Some(endpoint) => endpoint.clone(),
            None if !settings.service_name.is_empty() => {
                format!("https://{}.search.windows.net/", settings.service_name)
            }
            None => {
                return Err(SearchGptError::Config(
                    "search.service_name or search.endpoint must be set".to_string(),
                ))
            }
        };

        let api_key = std::env::var("AZURE_SEARCH_API_KEY")
            .map_err(|_| SearchGptError::Config("AZURE_SEARCH_API_KEY not set".to_string()))?;

        Self::new(
            &endpoint,
            &settings.index_name,
            api_key,
            &settings.api_version,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    /// The fully-qualified search URL, including the API version.
    pub fn search_url(&self) -> &Url {
        &self.search_url
    }
}

#[async_trait]
impl SearchClient for AzureSearchClient {
    #[instrument(skip(self, options))]
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            search: query,
            select: options.selected_fields.join(","),
            highlight: options.highlight_spec(),
            top: options.top,
        };

        let response = self
            .http
            .post(self.search_url.clone())
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorEnvelope>(&text) {
                Ok(envelope) => match envelope.error.code {
                    Some(code) if !code.is_empty() => format!("{}: {}", code, envelope.error.message),
                    _ => envelope.error.message,
                },
                Err(_) if text.is_empty() => "no response body".to_string(),
                Err(_) => text,
            };
            return Err(SearchGptError::Search(format!(
                "Search request failed with status {}: {}",
                status, message
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        let content_field = options
            .selected_fields
            .first()
            .map(String::as_str)
            .unwrap_or("content");

        let hits: Vec<SearchHit> = parsed
            .value
            .into_iter()
            .map(|raw| SearchHit {
                score: raw.score,
                content: raw
                    .fields
                    .get(content_field)
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                highlights: raw.highlights.unwrap_or_default(),
            })
            .collect();

        debug!("Search returned {} documents", hits.len());
        Ok(hits)
    }
}
