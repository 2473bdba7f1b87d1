//! Model abstraction
//!
//! Agents talk to the LLM runtime through [`ModelClient`]. A [`ModelProvider`]
//! builds a client bound to a model id and region; production uses Bedrock,
//! tests use the scripted client in [`testing`].

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Model identifiers accepted by the HTTP API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "gpt-4o")]
    Gpt4o,
    #[serde(rename = "o3-mini")]
    O3Mini,
    #[default]
    #[serde(rename = "amazon.nova-lite-v1:0")]
    NovaLite,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [ModelId::Gpt4o, ModelId::O3Mini, ModelId::NovaLite];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Gpt4o => "gpt-4o",
            ModelId::O3Mini => "o3-mini",
            ModelId::NovaLite => "amazon.nova-lite-v1:0",
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ModelId::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown model '{}'", s))
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// Result of a tool call, fed back to the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
}

/// Tool description advertised to the model
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Message in a conversation sent to the model
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    User(String),
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    ToolResults(Vec<ToolOutput>),
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            text: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// One buffered model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Incremental output of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    ToolCall(ToolCall),
}

pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model identifier this client invokes
    fn id(&self) -> &str;

    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn>;

    async fn stream(&self, request: ModelRequest) -> Result<EventStream>;
}

#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Build a client for `model_id` in `region`
    async fn connect(&self, model_id: &str, region: &str) -> Result<Arc<dyn ModelClient>>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_wire_names() {
        assert_eq!(
            serde_json::to_value(ModelId::NovaLite).unwrap(),
            "amazon.nova-lite-v1:0"
        );
        let parsed: ModelId = serde_json::from_str("\"o3-mini\"").unwrap();
        assert_eq!(parsed, ModelId::O3Mini);
        assert!(serde_json::from_str::<ModelId>("\"claude\"").is_err());
    }

    #[test]
    fn test_model_id_default_and_parse() {
        assert_eq!(ModelId::default(), ModelId::NovaLite);
        assert_eq!("gpt-4o".parse::<ModelId>().unwrap(), ModelId::Gpt4o);
        assert!("nova".parse::<ModelId>().is_err());
    }
}
