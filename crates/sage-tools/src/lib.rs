//! Sage Tools - capabilities that Sage agents can call
//!
//! Tools are organized by category:
//! - brave: Brave Search API client (used when an API key is configured)
//! - duckduckgo: DuckDuckGo Instant Answer client (keyless fallback)
//! - web_search: backend-agnostic web search used by the agents

pub mod brave;
pub mod duckduckgo;
pub mod web_search;

pub use brave::{BraveClient, BraveError, SearchOptions, SearchResponse};
pub use duckduckgo::{DuckDuckGoClient, DuckDuckGoError, InstantAnswer};
pub use web_search::{WebSearch, WebSearchArgs, WebSearchError};

/// Tool execution result
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Text handed back to the model: the output, or the error prefixed with `Error:`
    pub fn to_model_text(&self) -> String {
        if self.success {
            self.output.clone()
        } else {
            format!("Error: {}", self.error.as_deref().unwrap_or("Unknown error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_text_for_error() {
        let result = ToolResult::error("rate limited");
        assert!(!result.success);
        assert_eq!(result.to_model_text(), "Error: rate limited");
    }

    #[test]
    fn test_model_text_for_success() {
        let result = ToolResult::success("3 results");
        assert_eq!(result.to_model_text(), "3 results");
    }
}
