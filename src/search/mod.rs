//! Document search abstraction.
//!
//! Provides a trait-based interface over the external search service that holds
//! the indexed documents. Ranking is entirely up to the service.

mod azure;

pub use azure::AzureSearchClient;

use crate::config::SearchSettings;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Field projection and highlighting applied to every search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Fields returned for each matching document.
    pub selected_fields: Vec<String>,
    /// Field whose matches are highlighted.
    pub highlight_field: String,
    /// Highlight fragment setting sent alongside the field name.
    pub highlight_fragment_size: u32,
    /// Maximum number of documents to return.
    pub top: Option<u32>,
}

impl SearchOptions {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self {
            selected_fields: vec![settings.selected_field.clone()],
            highlight_field: settings.highlight_field.clone(),
            highlight_fragment_size: settings.highlight_fragment_size,
            top: settings.top,
        }
    }

    /// Highlight parameter in `field-N` form.
    pub fn highlight_spec(&self) -> String {
        format!("{}-{}", self.highlight_field, self.highlight_fragment_size)
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_settings(&SearchSettings::default())
    }
}

/// A matching document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHit {
    /// Relevance score assigned by the search service.
    pub score: f64,
    /// Projected `content` field, if present.
    pub content: Option<String>,
    /// Highlighted fragments keyed by field name.
    pub highlights: HashMap<String, Vec<String>>,
}

impl SearchHit {
    /// Highlighted fragments for a field, if the service returned any.
    pub fn highlights_for(&self, field: &str) -> Option<&[String]> {
        self.highlights.get(field).map(Vec::as_slice)
    }
}

/// Trait for search service clients.
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Run a full-text search and return matching documents in ranked order.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchHit>>;
}
