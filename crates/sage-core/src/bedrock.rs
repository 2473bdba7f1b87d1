//! Amazon Bedrock model client
//!
//! Each agent gets its own runtime client built from an explicit SDK config
//! bound to the configured region. Buffered calls use `Converse`, streamed
//! calls use `ConverseStream`; both are non-blocking.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::config::Region;
use aws_sdk_bedrockruntime::operation::converse_stream::{
    ConverseStreamOutput as ConverseStreamResponse,
};
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ContentBlockDelta, ContentBlockStart, ConversationRole, ConverseStreamOutput,
    Message, SystemContentBlock, Tool as BedrockTool, ToolConfiguration, ToolInputSchema,
    ToolResultBlock, ToolResultContentBlock, ToolSpecification, ToolUseBlock,
};
use aws_sdk_bedrockruntime::Client;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::{Document, Number};
use futures::Stream;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::model::{
    ChatMessage, EventStream, ModelClient, ModelProvider, ModelRequest, ModelTurn, StreamEvent,
    ToolCall,
};

/// Builds a [`BedrockModel`] per agent
#[derive(Debug, Clone, Copy, Default)]
pub struct BedrockProvider;

#[async_trait]
impl ModelProvider for BedrockProvider {
    async fn connect(&self, model_id: &str, region: &str) -> Result<Arc<dyn ModelClient>> {
        Ok(Arc::new(BedrockModel::connect(model_id, region).await))
    }
}

#[derive(Clone)]
pub struct BedrockModel {
    id: String,
    region: String,
    client: Client,
}

impl BedrockModel {
    /// Load credentials from the default chain and bind a runtime client to `region`
    pub async fn connect(model_id: &str, region: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        debug!("Bedrock client ready for {} in {}", model_id, region);

        Self {
            id: model_id.to_string(),
            region: region.to_string(),
            client: Client::new(&sdk_config),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

impl std::fmt::Debug for BedrockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BedrockModel")
            .field("id", &self.id)
            .field("region", &self.region)
            .finish()
    }
}

#[async_trait]
impl ModelClient for BedrockModel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelTurn> {
        let response = self
            .client
            .converse()
            .model_id(&self.id)
            .system(SystemContentBlock::Text(request.system))
            .set_messages(Some(to_bedrock_messages(&request.messages)?))
            .set_tool_config(tool_config(&request.tools)?)
            .send()
            .await
            .map_err(|e| anyhow!("Bedrock converse failed: {}", DisplayErrorContext(&e)))?;

        let message = response
            .output()
            .and_then(|output| output.as_message().ok())
            .ok_or_else(|| anyhow!("Bedrock returned no message"))?;

        let mut turn = ModelTurn::default();
        for block in message.content() {
            match block {
                ContentBlock::Text(text) => turn.text.push_str(text),
                ContentBlock::ToolUse(tool_use) => turn.tool_calls.push(ToolCall {
                    id: tool_use.tool_use_id().to_string(),
                    name: tool_use.name().to_string(),
                    args: document_to_json(tool_use.input()),
                }),
                _ => {}
            }
        }
        Ok(turn)
    }

    async fn stream(&self, request: ModelRequest) -> Result<EventStream> {
        let response = self
            .client
            .converse_stream()
            .model_id(&self.id)
            .system(SystemContentBlock::Text(request.system))
            .set_messages(Some(to_bedrock_messages(&request.messages)?))
            .set_tool_config(tool_config(&request.tools)?)
            .send()
            .await
            .map_err(|e| anyhow!("Bedrock converse stream failed: {}", DisplayErrorContext(&e)))?;

        Ok(Box::pin(stream_events(response)))
    }
}

/// Tool use block being assembled from stream deltas
struct PendingToolUse {
    id: String,
    name: String,
    input: String,
}

fn stream_events(
    mut output: ConverseStreamResponse,
) -> impl Stream<Item = Result<StreamEvent>> + Send {
    async_stream::try_stream! {
        let mut pending: Option<PendingToolUse> = None;

        loop {
            let received = output
                .stream
                .recv()
                .await
                .map_err(|e| anyhow!("Bedrock stream error: {}", DisplayErrorContext(&e)))?;
            let Some(event) = received else { break };

            match event {
                ConverseStreamOutput::ContentBlockStart(start) => {
                    if let Some(ContentBlockStart::ToolUse(tool)) = start.start() {
                        pending = Some(PendingToolUse {
                            id: tool.tool_use_id().to_string(),
                            name: tool.name().to_string(),
                            input: String::new(),
                        });
                    }
                }
                ConverseStreamOutput::ContentBlockDelta(delta) => match delta.delta() {
                    Some(ContentBlockDelta::Text(text)) => {
                        yield StreamEvent::Text(text.clone());
                    }
                    Some(ContentBlockDelta::ToolUse(tool)) => {
                        if let Some(pending) = pending.as_mut() {
                            pending.input.push_str(tool.input());
                        }
                    }
                    _ => {}
                },
                ConverseStreamOutput::ContentBlockStop(_) => {
                    if let Some(tool) = pending.take() {
                        yield StreamEvent::ToolCall(ToolCall {
                            id: tool.id,
                            name: tool.name,
                            args: parse_tool_input(&tool.input)?,
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

fn parse_tool_input(input: &str) -> Result<Value> {
    if input.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(input).map_err(|e| anyhow!("invalid tool input from model: {}", e))
}

fn tool_config(tools: &[crate::model::ToolSpec]) -> Result<Option<ToolConfiguration>> {
    if tools.is_empty() {
        return Ok(None);
    }

    let specs = tools
        .iter()
        .map(|tool| {
            let spec = ToolSpecification::builder()
                .name(&tool.name)
                .description(&tool.description)
                .input_schema(ToolInputSchema::Json(json_to_document(&tool.input_schema)))
                .build()?;
            Ok(BedrockTool::ToolSpec(spec))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(ToolConfiguration::builder().set_tools(Some(specs)).build()?))
}

/// Convert the conversation into Bedrock messages.
///
/// Bedrock rejects empty text blocks and consecutive messages with the same
/// role. Empty messages are dropped and adjacent same-role messages merged.
fn to_bedrock_messages(messages: &[ChatMessage]) -> Result<Vec<Message>> {
    let mut turns: Vec<(ConversationRole, Vec<ContentBlock>)> =
        Vec::with_capacity(messages.len());

    for message in messages {
        let (role, blocks) = match message {
            ChatMessage::User(text) => (ConversationRole::User, text_block(text)),
            ChatMessage::Assistant { text, tool_calls } => {
                let mut blocks = text_block(text);
                for call in tool_calls {
                    blocks.push(ContentBlock::ToolUse(
                        ToolUseBlock::builder()
                            .tool_use_id(&call.id)
                            .name(&call.name)
                            .input(json_to_document(&call.args))
                            .build()?,
                    ));
                }
                (ConversationRole::Assistant, blocks)
            }
            ChatMessage::ToolResults(outputs) => {
                let blocks = outputs
                    .iter()
                    .map(|output| {
                        Ok(ContentBlock::ToolResult(
                            ToolResultBlock::builder()
                                .tool_use_id(&output.call_id)
                                .content(ToolResultContentBlock::Text(output.content.clone()))
                                .build()?,
                        ))
                    })
                    .collect::<Result<Vec<_>>>()?;
                (ConversationRole::User, blocks)
            }
        };

        if blocks.is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some((last, content)) if *last == role => content.extend(blocks),
            _ => turns.push((role, blocks)),
        }
    }

    turns
        .into_iter()
        .map(|(role, blocks)| {
            Ok(Message::builder()
                .role(role)
                .set_content(Some(blocks))
                .build()?)
        })
        .collect()
}

fn text_block(text: &str) -> Vec<ContentBlock> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![ContentBlock::Text(text.to_string())]
    }
}

fn json_to_document(value: &Value) -> Document {
    match value {
        Value::Null => Document::Null,
        Value::Bool(b) => Document::Bool(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Document::Number(Number::PosInt(u))
            } else if let Some(i) = n.as_i64() {
                Document::Number(Number::NegInt(i))
            } else {
                Document::Number(Number::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Document::String(s.clone()),
        Value::Array(items) => Document::Array(items.iter().map(json_to_document).collect()),
        Value::Object(map) => Document::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_document(v)))
                .collect(),
        ),
    }
}

fn document_to_json(document: &Document) -> Value {
    match document {
        Document::Null => Value::Null,
        Document::Bool(b) => Value::Bool(*b),
        Document::Number(Number::PosInt(u)) => Value::from(*u),
        Document::Number(Number::NegInt(i)) => Value::from(*i),
        Document::Number(Number::Float(f)) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Document::String(s) => Value::String(s.clone()),
        Document::Array(items) => Value::Array(items.iter().map(document_to_json).collect()),
        Document::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), document_to_json(v)))
                .collect(),
        ),
    }
}
