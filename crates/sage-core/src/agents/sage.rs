//! Sage: knowledge agent with web search, session history and a knowledge base

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AgentContext, AgentOptions, AgentType};
use crate::agent::Agent;
use crate::knowledge::KnowledgeBase;
use crate::storage::{PgSessionStore, SessionStore};
use crate::tools::{ChatHistoryTool, KnowledgeSearchTool, WebSearchTool};

pub const SAGE_SESSIONS_TABLE: &str = "sage_sessions";
pub const SAGE_KNOWLEDGE_TABLE: &str = "sage_knowledge";
const NUM_HISTORY_RESPONSES: usize = 3;

const CHAT_HISTORY_MESSAGES: usize = 20;

const SAGE_PROMPT: &str = "\
You are Sage, an advanced Knowledge Agent designed to deliver accurate, context-rich, and engaging responses.
You have access to a comprehensive knowledge base and web search capabilities.

Your core capabilities:
- Search your knowledge base for relevant information
- Search the web when needed for current information
- Maintain conversation context and memory
- Provide clear, well-structured responses with proper citations

Response Guidelines:
1. **Always search your knowledge base first** for relevant information
2. **Use web search** if knowledge base results are insufficient
3. **Start with a direct answer** to the user's question
4. **Expand with context** including explanations, examples, and supporting evidence
5. **Include proper citations** from both knowledge base and web sources
6. **Maintain conversation flow** by referencing previous interactions when relevant
7. **Ask follow-up questions** to enhance engagement

Keep responses clear, concise, and well-structured. Avoid unnecessary hedging.
";

pub fn system_message(user_id: Option<&str>) -> String {
    match user_id {
        Some(user) => format!(
            "{}\n<context>You are interacting with user: {}</context>",
            SAGE_PROMPT, user
        ),
        None => SAGE_PROMPT.to_string(),
    }
}

pub async fn get_sage(ctx: &AgentContext, options: AgentOptions) -> Result<Agent> {
    let settings = &ctx.settings;
    let model_id = options
        .model_id
        .unwrap_or_else(|| settings.default_model.clone());
    let model = ctx.models.connect(&model_id, &settings.aws_region).await?;

    let (storage, knowledge): (Arc<dyn SessionStore>, Option<Arc<KnowledgeBase>>) =
        match &ctx.database {
            Some(db) => {
                let sessions = PgSessionStore::new(db.clone(), SAGE_SESSIONS_TABLE)?;
                let knowledge = KnowledgeBase::new(db.clone(), SAGE_KNOWLEDGE_TABLE)?;
                (Arc::new(sessions) as Arc<dyn SessionStore>, Some(Arc::new(knowledge)))
            }
            None => {
                warn!("No database configured; Sage runs without a knowledge base");
                (ctx.fallback_sessions.clone() as Arc<dyn SessionStore>, None)
            }
        };
    debug!("Sage sessions in {}", storage.table_name());

    let session_id = options
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let chat_history =
        ChatHistoryTool::new(storage.clone(), session_id.as_str(), CHAT_HISTORY_MESSAGES);

    let mut builder = Agent::builder("Sage", AgentType::Sage.as_str(), model)
        .user_id(options.user_id.clone())
        .session_id(Some(session_id))
        .region(settings.aws_region.as_str())
        .system_message(system_message(options.user_id.as_deref()))
        .tool(Arc::new(WebSearchTool::new(ctx.web_search.clone())))
        .tool(Arc::new(chat_history))
        .storage(storage)
        .history_responses(NUM_HISTORY_RESPONSES)
        .add_datetime(true)
        .debug_mode(options.debug_mode.unwrap_or(settings.debug_mode))
        .max_steps(settings.max_steps);

    if let Some(knowledge) = knowledge {
        builder = builder
            .knowledge(knowledge.clone())
            .tool(Arc::new(KnowledgeSearchTool::new(knowledge)));
    }

    Ok(builder.build())
}
