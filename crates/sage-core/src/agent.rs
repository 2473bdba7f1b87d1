//! Sage agent runtime
//!
//! An [`Agent`] bundles a model client, a system prompt, tools and optional
//! session storage / knowledge. `run` returns the whole response at once;
//! `run_stream` yields text chunks as the model produces them. Both execute
//! requested tool calls and feed results back to the model, up to `max_steps`
//! model calls per run.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::{Stream, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::knowledge::KnowledgeBase;
use crate::model::{
    ChatMessage, ModelClient, ModelRequest, StreamEvent, ToolCall, ToolOutput, ToolSpec,
};
use crate::storage::{MessageRole, SessionMessage, SessionStore};

pub use sage_tools::ToolResult;

pub const DEFAULT_MAX_STEPS: usize = 10;

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, args: &HashMap<String, String>) -> Result<ToolResult>;
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Tool descriptions advertised to the model
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }
}

/// Outcome of a buffered run
#[derive(Debug, Clone)]
pub struct RunResponse {
    pub run_id: Uuid,
    pub session_id: String,
    pub model: String,
    /// All text the model produced during the run
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone)]
pub struct Agent {
    name: String,
    agent_id: String,
    user_id: Option<String>,
    session_id: String,
    system_message: String,
    region: String,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    storage: Option<Arc<dyn SessionStore>>,
    knowledge: Option<Arc<KnowledgeBase>>,
    history_responses: usize,
    add_datetime: bool,
    debug_mode: bool,
    max_steps: usize,
}

impl Agent {
    pub fn builder(
        name: impl Into<String>,
        agent_id: impl Into<String>,
        model: Arc<dyn ModelClient>,
    ) -> AgentBuilder {
        AgentBuilder {
            agent: Agent {
                name: name.into(),
                agent_id: agent_id.into(),
                user_id: None,
                session_id: String::new(),
                system_message: String::new(),
                region: String::new(),
                model,
                tools: ToolRegistry::new(),
                storage: None,
                knowledge: None,
                history_responses: 0,
                add_datetime: false,
                debug_mode: false,
                max_steps: DEFAULT_MAX_STEPS,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn system_message(&self) -> &str {
        &self.system_message
    }

    pub fn model_id(&self) -> &str {
        self.model.id()
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn storage(&self) -> Option<&Arc<dyn SessionStore>> {
        self.storage.as_ref()
    }

    pub fn knowledge(&self) -> Option<&Arc<KnowledgeBase>> {
        self.knowledge.as_ref()
    }

    pub fn history_responses(&self) -> usize {
        self.history_responses
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Run to completion and return everything the model said
    pub async fn run(&self, message: &str) -> Result<RunResponse> {
        let run_id = Uuid::new_v4();
        info!("{} run {} (session {})", self.name, run_id, self.session_id);

        let mut messages = self.load_history();
        messages.push(ChatMessage::user(message));

        let mut content = String::new();
        let mut executed = Vec::new();

        for step in 0..self.max_steps {
            let turn = self.model.complete(self.request(&messages)).await?;
            debug!(
                "Step {}: {} chars, {} tool calls",
                step,
                turn.text.len(),
                turn.tool_calls.len()
            );

            content.push_str(&turn.text);
            let finished = turn.tool_calls.is_empty();
            let outputs = self.execute_tools(&turn.tool_calls).await;
            executed.extend(turn.tool_calls.iter().cloned());
            messages.push(ChatMessage::Assistant {
                text: turn.text,
                tool_calls: turn.tool_calls,
            });

            if finished {
                break;
            }
            messages.push(ChatMessage::ToolResults(outputs));
            if step + 1 == self.max_steps {
                warn!(
                    "{} stopped after {} steps with tool calls pending",
                    self.name, self.max_steps
                );
            }
        }

        self.persist(message, &content);

        Ok(RunResponse {
            run_id,
            session_id: self.session_id.clone(),
            model: self.model.id().to_string(),
            content,
            tool_calls: executed,
        })
    }

    /// Stream non-empty text chunks as the model produces them.
    ///
    /// Consumes the agent so the stream can outlive the caller. An error from
    /// the model ends the stream with that error.
    pub fn run_stream(
        self,
        message: String,
    ) -> impl Stream<Item = Result<String>> + Send + 'static {
        async_stream::try_stream! {
            let run_id = Uuid::new_v4();
            info!("{} streaming run {} (session {})", self.name, run_id, self.session_id);

            let mut messages = self.load_history();
            messages.push(ChatMessage::user(message.as_str()));
            let mut content = String::new();

            for step in 0..self.max_steps {
                let mut events = self.model.stream(self.request(&messages)).await?;
                let mut text = String::new();
                let mut tool_calls = Vec::new();

                while let Some(event) = events.next().await {
                    match event? {
                        StreamEvent::Text(chunk) => {
                            if chunk.is_empty() {
                                continue;
                            }
                            text.push_str(&chunk);
                            yield chunk;
                        }
                        StreamEvent::ToolCall(call) => tool_calls.push(call),
                    }
                }
                debug!("Step {}: {} chars, {} tool calls", step, text.len(), tool_calls.len());

                content.push_str(&text);
                let finished = tool_calls.is_empty();
                let outputs = self.execute_tools(&tool_calls).await;
                messages.push(ChatMessage::Assistant { text, tool_calls });

                if finished {
                    break;
                }
                messages.push(ChatMessage::ToolResults(outputs));
                if step + 1 == self.max_steps {
                    warn!(
                        "{} stopped after {} steps with tool calls pending",
                        self.name, self.max_steps
                    );
                }
            }

            self.persist(&message, &content);
        }
    }

    fn request(&self, messages: &[ChatMessage]) -> ModelRequest {
        let system = self.instructions();
        if self.debug_mode {
            debug!(
                "{} -> {} ({} messages, tools: {:?})\n{}",
                self.name,
                self.model.id(),
                messages.len(),
                self.tools.names(),
                system
            );
        }
        ModelRequest {
            system,
            messages: messages.to_vec(),
            tools: self.tools.specs(),
        }
    }

    fn instructions(&self) -> String {
        let mut system = self.system_message.clone();
        if self.add_datetime {
            system.push_str(&format!(
                "\n\nThe current time is {}.",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        system
    }

    /// Previous exchanges of this session, oldest first, starting with a user turn
    fn load_history(&self) -> Vec<ChatMessage> {
        let Some(storage) = &self.storage else {
            return Vec::new();
        };
        if self.history_responses == 0 {
            return Vec::new();
        }

        let records = match storage.recent(&self.session_id, self.history_responses * 2) {
            Ok(records) => records,
            Err(e) => {
                warn!("Failed to load history for session {}: {}", self.session_id, e);
                return Vec::new();
            }
        };

        let history: Vec<ChatMessage> = records
            .into_iter()
            .map(|record| match record.role {
                MessageRole::User => ChatMessage::user(record.content),
                MessageRole::Assistant => ChatMessage::assistant(record.content),
            })
            .skip_while(|m| matches!(m, ChatMessage::Assistant { .. }))
            .collect();
        debug!("Loaded {} history messages", history.len());
        history
    }

    fn persist(&self, message: &str, content: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        if content.is_empty() {
            debug!("Skipping storage of empty response");
            return;
        }

        let records: Vec<_> = [(MessageRole::User, message), (MessageRole::Assistant, content)]
            .into_iter()
            .map(|(role, text)| {
                SessionMessage::new(
                    &self.session_id,
                    &self.agent_id,
                    self.user_id.as_deref(),
                    role,
                    text,
                )
            })
            .collect();
        if let Err(e) = storage.append(&records) {
            error!("Failed to store exchange: {}", e);
        }
    }

    async fn execute_tools(&self, calls: &[ToolCall]) -> Vec<ToolOutput> {
        let mut outputs = Vec::with_capacity(calls.len());

        for call in calls {
            info!("Executing tool: {} with args: {}", call.name, call.args);

            let result = match self.tools.get(&call.name) {
                Some(tool) => match tool.execute(&tool_args(&call.args)).await {
                    Ok(result) => result,
                    Err(e) => {
                        error!("Tool {} error: {}", call.name, e);
                        ToolResult::error(e.to_string())
                    }
                },
                None => {
                    warn!("Unknown tool: {}", call.name);
                    ToolResult::error(format!("Unknown tool: {}", call.name))
                }
            };

            outputs.push(ToolOutput {
                call_id: call.id.clone(),
                content: result.to_model_text(),
            });
        }

        outputs
    }
}

/// Flatten a JSON arguments object into the string map tools consume
fn tool_args(args: &serde_json::Value) -> HashMap<String, String> {
    match args {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => HashMap::new(),
    }
}

pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    pub fn user_id(mut self, user_id: Option<String>) -> Self {
        self.agent.user_id = user_id;
        self
    }

    /// A fresh session id is generated when none is given
    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.agent.session_id = session_id.unwrap_or_default();
        self
    }

    pub fn system_message(mut self, system_message: impl Into<String>) -> Self {
        self.agent.system_message = system_message.into();
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.agent.region = region.into();
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.agent.tools.register(tool);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn SessionStore>) -> Self {
        self.agent.storage = Some(storage);
        self
    }

    pub fn knowledge(mut self, knowledge: Arc<KnowledgeBase>) -> Self {
        self.agent.knowledge = Some(knowledge);
        self
    }

    /// Number of previous responses replayed from storage
    pub fn history_responses(mut self, count: usize) -> Self {
        self.agent.history_responses = count;
        self
    }

    pub fn add_datetime(mut self, enabled: bool) -> Self {
        self.agent.add_datetime = enabled;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.agent.debug_mode = enabled;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.agent.max_steps = max_steps.max(1);
        self
    }

    pub fn build(mut self) -> Agent {
        if self.agent.session_id.trim().is_empty() {
            self.agent.session_id = Uuid::new_v4().to_string();
        }
        self.agent
    }
}
