//! Tools the Sage agents register

use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{Tool, ToolResult};
use crate::knowledge::KnowledgeBase;
use crate::storage::SessionStore;
use sage_tools::{WebSearch, WebSearchArgs};

const KNOWLEDGE_RESULTS: usize = 5;

/// Deserialize string-valued tool arguments into a typed args struct
fn parse_args<T: DeserializeOwned>(args: &HashMap<String, String>) -> Result<T> {
    let value = serde_json::to_value(args)?;
    serde_json::from_value(value).context("invalid tool arguments")
}

/// Web search through Brave (with an API key) or DuckDuckGo
pub struct WebSearchTool {
    search: Arc<WebSearch>,
}

impl WebSearchTool {
    pub fn new(search: Arc<WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information: news, recent events, facts and sources. \
         Use it whenever the answer may depend on up-to-date information."
    }

    fn input_schema(&self) -> serde_json::Value {
        WebSearchArgs::json_schema()
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let query = args
            .get("query")
            .ok_or_else(|| anyhow::anyhow!("query argument required"))?;

        let args = WebSearchArgs {
            query: query.clone(),
            count: args.get("count").and_then(|c| c.parse().ok()),
            freshness: args.get("freshness").cloned(),
        };

        match self.search.search(&args).await {
            Ok(results) => Ok(ToolResult::success(results)),
            Err(e) => Ok(ToolResult::error(format!("Search failed: {}", e))),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct KnowledgeSearchArgs {
    #[schemars(description = "What to look up in the knowledge base")]
    query: String,
}

/// Search over the agent's knowledge base documents
pub struct KnowledgeSearchTool {
    knowledge: Arc<KnowledgeBase>,
}

impl KnowledgeSearchTool {
    pub fn new(knowledge: Arc<KnowledgeBase>) -> Self {
        Self { knowledge }
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the knowledge base for documents relevant to the query."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(KnowledgeSearchArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let args: KnowledgeSearchArgs = parse_args(args)?;

        let documents = match self.knowledge.search(&args.query, KNOWLEDGE_RESULTS) {
            Ok(documents) => documents,
            Err(e) => return Ok(ToolResult::error(format!("Knowledge search failed: {}", e))),
        };

        if documents.is_empty() {
            return Ok(ToolResult::success("No matching documents found.".to_string()));
        }

        let output = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| {
                format!(
                    "{}. {} (score {:.3})\n{}",
                    i + 1,
                    doc.name,
                    doc.score,
                    doc.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(ToolResult::success(output))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ChatHistoryArgs {
    #[schemars(description = "How many of the most recent messages to return")]
    num_messages: Option<usize>,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    role: &'a str,
    content: &'a str,
}

/// Read back earlier messages of the agent's own session
pub struct ChatHistoryTool {
    store: Arc<dyn SessionStore>,
    session_id: String,
    limit: usize,
}

impl ChatHistoryTool {
    pub fn new(store: Arc<dyn SessionStore>, session_id: impl Into<String>, limit: usize) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            limit: limit.max(1),
        }
    }
}

#[async_trait]
impl Tool for ChatHistoryTool {
    fn name(&self) -> &str {
        "get_chat_history"
    }

    fn description(&self) -> &str {
        "Read the earlier messages of this conversation, oldest first, as a JSON list. \
         Use it when the user refers to something said before."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(ChatHistoryArgs)).unwrap_or_default()
    }

    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult> {
        let limit = match args.get("num_messages") {
            Some(n) => n
                .trim()
                .parse::<usize>()
                .context("num_messages must be a number")?
                .clamp(1, self.limit),
            None => self.limit,
        };

        let messages = match self.store.recent(&self.session_id, limit) {
            Ok(messages) => messages,
            Err(e) => return Ok(ToolResult::error(format!("Failed to read chat history: {}", e))),
        };

        let entries: Vec<_> = messages
            .iter()
            .map(|m| HistoryEntry {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();
        Ok(ToolResult::success(serde_json::to_string(&entries)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemorySessionStore, MessageRole, SessionMessage};

    #[tokio::test]
    async fn test_web_search_requires_query() {
        let tool = WebSearchTool::new(Arc::new(WebSearch::duckduckgo().unwrap()));
        assert_eq!(tool.name(), "web_search");
        assert!(tool.execute(&HashMap::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_web_search_reports_empty_query() {
        let tool = WebSearchTool::new(Arc::new(WebSearch::duckduckgo().unwrap()));
        let args = HashMap::from([("query".to_string(), "  ".to_string())]);
        let result = tool.execute(&args).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Search failed"));
    }

    #[test]
    fn test_knowledge_schema() {
        let schema = serde_json::to_value(schemars::schema_for!(KnowledgeSearchArgs)).unwrap();
        assert_eq!(schema["required"][0], "query");
    }

    fn history_store() -> Arc<InMemorySessionStore> {
        let store = Arc::new(InMemorySessionStore::new("sage_sessions"));
        for (session, role, content) in [
            ("s-1", MessageRole::User, "I'm Ada"),
            ("s-1", MessageRole::Assistant, "Hello Ada"),
            ("s-2", MessageRole::User, "someone else"),
            ("s-1", MessageRole::User, "What's the capital of France?"),
            ("s-1", MessageRole::Assistant, "Paris."),
        ] {
            let message = SessionMessage::new(session, "sage", None, role, content);
            store.append(&[message]).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_chat_history_reads_own_session() {
        let tool = ChatHistoryTool::new(history_store(), "s-1", 6);
        assert_eq!(tool.name(), "get_chat_history");

        let result = tool.execute(&HashMap::new()).await.unwrap();
        assert!(result.success);
        let entries: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["role"], "user");
        assert_eq!(entries[0]["content"], "I'm Ada");
        assert_eq!(entries[3]["content"], "Paris.");
    }

    #[tokio::test]
    async fn test_chat_history_respects_requested_count() {
        let tool = ChatHistoryTool::new(history_store(), "s-1", 6);

        let args = HashMap::from([("num_messages".to_string(), "2".to_string())]);
        let result = tool.execute(&args).await.unwrap();
        let entries: serde_json::Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(entries.as_array().unwrap().len(), 2);
        assert_eq!(entries[0]["role"], "user");

        let args = HashMap::from([("num_messages".to_string(), "lots".to_string())]);
        assert!(tool.execute(&args).await.is_err());
    }

    #[test]
    fn test_knowledge_args_parsed_from_tool_arguments() {
        let args = HashMap::from([("query".to_string(), "bitcoin".to_string())]);
        let parsed: KnowledgeSearchArgs = parse_args(&args).unwrap();
        assert_eq!(parsed.query, "bitcoin");
        assert!(parse_args::<KnowledgeSearchArgs>(&HashMap::new()).is_err());
    }
}
