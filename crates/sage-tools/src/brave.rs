//! Brave Search API client
//!
//! Covers the web search endpoint with:
//! - AI Summarizer integration
//! - Freshness filtering
//! - FAQ, news and infobox results

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const BRAVE_API_BASE: &str = "https://api.search.brave.com/res/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_COUNT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum BraveError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Search options for customizing queries
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Number of results (max 20)
    pub count: Option<u32>,
    /// Freshness filter: "pd" (24h), "pw" (week), "pm" (month), "py" (year)
    pub freshness: Option<String>,
}

#[derive(Clone)]
pub struct BraveClient {
    client: reqwest::Client,
    api_key: Arc<String>,
}

impl BraveClient {
    pub fn new(api_key: String) -> Result<Self, BraveError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("Sage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
        })
    }

    pub async fn search(
        &self,
        query: &str,
        options: Option<SearchOptions>,
    ) -> Result<SearchResponse, BraveError> {
        let opts = options.unwrap_or_default();

        let mut params = vec![
            ("q", query.to_string()),
            ("summary", "1".to_string()),
            ("extra_snippets", "true".to_string()),
            ("spellcheck", "true".to_string()),
        ];
        if let Some(count) = opts.count {
            params.push(("count", count.min(MAX_COUNT).to_string()));
        }
        if let Some(freshness) = opts.freshness {
            params.push(("freshness", freshness));
        }

        let mut search_response: SearchResponse =
            self.get_json("web/search", &params).await?;

        if let Some(key) = search_response.summarizer.as_ref().map(|s| s.key.clone()) {
            debug!("Fetching Brave AI summary...");
            match self
                .get_json::<SummarizerResponse>("summarizer/search", &[("key", key)])
                .await
            {
                Ok(summary) => search_response.summary_text = summary.extract_text(),
                Err(e) => warn!("Failed to fetch Brave summary: {}", e),
            }
        }

        Ok(search_response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, BraveError> {
        let response = self
            .client
            .get(format!("{}/{}", BRAVE_API_BASE, path))
            .header("X-Subscription-Token", self.api_key.as_str())
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BraveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for BraveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraveClient")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub query: Option<QueryInfo>,
    pub web: Option<ResultList<WebResult>>,
    pub news: Option<ResultList<WebResult>>,
    pub faq: Option<ResultList<FaqResult>>,
    pub infobox: Option<Infobox>,
    pub summarizer: Option<Summarizer>,
    /// Populated after fetching the summary
    #[serde(skip)]
    pub summary_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryInfo {
    pub original: Option<String>,
    pub altered: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultList<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub age: Option<String>,
    pub extra_snippets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaqResult {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Infobox {
    pub title: Option<String>,
    pub description: Option<String>,
    pub long_desc: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Summarizer {
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizerResponse {
    pub summary: Option<Vec<SummaryItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub data: Option<serde_json::Value>,
}

impl SummarizerResponse {
    /// Concatenate the `token` items of a summary
    pub fn extract_text(&self) -> Option<String> {
        let text: String = self
            .summary
            .as_ref()?
            .iter()
            .filter(|item| item.item_type == "token")
            .filter_map(|item| item.data.as_ref().and_then(|d| d.as_str()))
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

// ============================================================================
// Result Formatting
// ============================================================================

impl SearchResponse {
    pub fn format_results(&self) -> String {
        let mut output = String::new();

        if let Some(QueryInfo {
            original,
            altered: Some(altered),
        }) = &self.query
        {
            if original.as_ref() != Some(altered) {
                output.push_str(&format!("*Showing results for: {}*\n\n", altered));
            }
        }

        if let Some(summary) = &self.summary_text {
            output.push_str(&format!("**AI Summary:**\n{}\n\n---\n\n", summary));
        }

        if let Some(title) = self.infobox.as_ref().and_then(|i| i.title.as_ref()) {
            output.push_str(&format!("**{}**\n", title));
            let infobox = self.infobox.as_ref();
            if let Some(desc) = infobox
                .and_then(|i| i.long_desc.as_ref().or(i.description.as_ref()))
            {
                output.push_str(&format!("{}\n", desc));
            }
            output.push('\n');
        }

        let faq = self.faq.as_ref().map(|f| f.results.as_slice()).unwrap_or_default();
        if !faq.is_empty() {
            output.push_str("**FAQ:**\n\n");
            for item in faq.iter().take(3) {
                output.push_str(&format!("Q: {}\nA: {}\n\n", item.question, item.answer));
            }
        }

        let web = self.web.as_ref().map(|w| w.results.as_slice()).unwrap_or_default();
        if !web.is_empty() {
            output.push_str("**Search Results:**\n\n");
            for (i, result) in web.iter().take(5).enumerate() {
                output.push_str(&result.format_entry(i + 1));
                for snippet in result.extra_snippets.iter().flatten().take(2) {
                    output.push_str(&format!("   > {}\n", snippet));
                }
                output.push('\n');
            }
        }

        let news = self.news.as_ref().map(|n| n.results.as_slice()).unwrap_or_default();
        if !news.is_empty() {
            output.push_str("**Recent News:**\n\n");
            for (i, result) in news.iter().take(3).enumerate() {
                output.push_str(&result.format_entry(i + 1));
                output.push('\n');
            }
        }

        if output.is_empty() {
            "No results found.".to_string()
        } else {
            output
        }
    }
}

impl WebResult {
    fn format_entry(&self, position: usize) -> String {
        let age = self
            .age
            .as_deref()
            .map(|a| format!(" ({})", a))
            .unwrap_or_default();
        format!(
            "{}. {}{}\n   URL: {}\n   {}\n",
            position,
            self.title,
            age,
            self.url,
            self.description.as_deref().unwrap_or("")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_web_and_faq_results() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({
            "query": { "original": "rust lang", "altered": "rust language" },
            "faq": { "results": [{ "question": "What is Rust?", "answer": "A language." }] },
            "web": { "results": [{
                "title": "Rust",
                "url": "https://www.rust-lang.org",
                "description": "A language empowering everyone",
                "age": "2 days ago",
                "extra_snippets": ["Fast", "Reliable", "Productive"]
            }]}
        }))
        .unwrap();

        let formatted = response.format_results();
        assert!(formatted.starts_with("*Showing results for: rust language*"));
        assert!(formatted.contains("Q: What is Rust?\nA: A language."));
        assert!(formatted.contains("1. Rust (2 days ago)\n   URL: https://www.rust-lang.org"));
        assert!(formatted.contains("   > Reliable\n"));
        assert!(!formatted.contains("Productive"));
    }

    #[test]
    fn test_format_empty_response() {
        let response: SearchResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(response.format_results(), "No results found.");
    }

    #[test]
    fn test_summary_extracts_tokens_only() {
        let summary: SummarizerResponse = serde_json::from_value(serde_json::json!({
            "summary": [
                { "type": "token", "data": "Paris is " },
                { "type": "enum_item", "data": { "x": 1 } },
                { "type": "token", "data": "the capital." }
            ]
        }))
        .unwrap();
        assert_eq!(summary.extract_text().as_deref(), Some("Paris is the capital."));
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = BraveClient::new("secret-key".to_string()).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-key"));
    }
}
