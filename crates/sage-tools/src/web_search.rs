//! Web search tool backed by Brave or DuckDuckGo

use crate::brave::{BraveClient, BraveError, SearchOptions};
use crate::duckduckgo::{DuckDuckGoClient, DuckDuckGoError};
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const DEFAULT_COUNT: u32 = 5;

#[derive(Debug, Error)]
pub enum WebSearchError {
    #[error("search query must not be empty")]
    EmptyQuery,
    #[error("Brave search failed: {0}")]
    Brave(#[from] BraveError),
    #[error("DuckDuckGo search failed: {0}")]
    DuckDuckGo(#[from] DuckDuckGoError),
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    #[schemars(description = "The search query to look up on the web")]
    pub query: String,
    #[schemars(description = "Number of results to return (default 5, max 20)")]
    pub count: Option<u32>,
    #[schemars(description = "Recency filter: pd (day), pw (week), pm (month) or py (year)")]
    pub freshness: Option<String>,
}

const FRESHNESS_VALUES: [&str; 4] = ["pd", "pw", "pm", "py"];

impl WebSearchArgs {
    /// JSON schema handed to the model as the tool's input schema
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(WebSearchArgs)).unwrap_or_default()
    }

    fn brave_options(&self, count: u32) -> SearchOptions {
        let freshness = self
            .freshness
            .as_deref()
            .map(str::trim)
            .filter(|f| FRESHNESS_VALUES.contains(f))
            .map(str::to_string);
        SearchOptions {
            count: Some(count),
            freshness,
        }
    }
}

#[derive(Debug, Clone)]
enum Backend {
    Brave(BraveClient),
    DuckDuckGo(DuckDuckGoClient),
}

#[derive(Debug, Clone)]
pub struct WebSearch {
    backend: Backend,
}

impl WebSearch {
    pub fn brave(api_key: &str) -> Result<Self, WebSearchError> {
        Ok(Self {
            backend: Backend::Brave(BraveClient::new(api_key.to_string())?),
        })
    }

    pub fn duckduckgo() -> Result<Self, WebSearchError> {
        Ok(Self {
            backend: Backend::DuckDuckGo(DuckDuckGoClient::new()?),
        })
    }

    /// Brave when a key is available, DuckDuckGo otherwise
    pub fn from_api_key(brave_api_key: Option<&str>) -> Result<Self, WebSearchError> {
        match brave_api_key.filter(|k| !k.trim().is_empty()) {
            Some(key) => Self::brave(key),
            None => Self::duckduckgo(),
        }
    }

    pub fn provider(&self) -> &'static str {
        match self.backend {
            Backend::Brave(_) => "brave",
            Backend::DuckDuckGo(_) => "duckduckgo",
        }
    }

    /// Run a search and return results formatted for the model
    pub async fn search(&self, args: &WebSearchArgs) -> Result<String, WebSearchError> {
        let query = args.query.trim();
        if query.is_empty() {
            return Err(WebSearchError::EmptyQuery);
        }
        let count = args.count.unwrap_or(DEFAULT_COUNT);
        debug!("Web search via {}: {}", self.provider(), query);

        match &self.backend {
            Backend::Brave(client) => {
                let response = client.search(query, Some(args.brave_options(count))).await?;
                Ok(response.format_results())
            }
            Backend::DuckDuckGo(client) => {
                let answer = client.search(query).await?;
                Ok(answer.format_results(count as usize))
            }
        }
    }
}
