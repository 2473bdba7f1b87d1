//! Agent catalogue
//!
//! Each [`AgentType`] has a factory that assembles a fresh [`Agent`] per
//! request from the shared [`AgentContext`].

pub mod sage;
pub mod test_sage;

use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::bedrock::BedrockProvider;
use crate::config::{AgentSettings, Config};
use crate::db::PgDatabase;
use crate::model::ModelProvider;
use crate::storage::InMemorySessionStore;
use sage_tools::WebSearch;

pub use sage::get_sage;
pub use test_sage::get_test_sage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentType {
    Sage,
    TestSage,
}

impl AgentType {
    pub const ALL: [AgentType; 2] = [AgentType::Sage, AgentType::TestSage];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Sage => "sage",
            AgentType::TestSage => "test_sage",
        }
    }

    pub async fn build(self, ctx: &AgentContext, options: AgentOptions) -> Result<Agent> {
        match self {
            AgentType::Sage => get_sage(ctx, options).await,
            AgentType::TestSage => get_test_sage(ctx, options).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Agent {0} not found")]
pub struct UnknownAgent(pub String);

impl FromStr for AgentType {
    type Err = UnknownAgent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentType::ALL
            .into_iter()
            .find(|agent| agent.as_str() == s)
            .ok_or_else(|| UnknownAgent(s.to_string()))
    }
}

/// Identifiers of every agent that can be run
pub fn available_agents() -> Vec<&'static str> {
    AgentType::ALL.iter().map(AgentType::as_str).collect()
}

/// Per-request overrides for an agent factory
#[derive(Debug, Clone, Default)]
pub struct AgentOptions {
    pub model_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub debug_mode: Option<bool>,
}

/// Shared dependencies the factories draw on
#[derive(Clone)]
pub struct AgentContext {
    pub settings: AgentSettings,
    pub models: Arc<dyn ModelProvider>,
    pub web_search: Arc<WebSearch>,
    pub database: Option<PgDatabase>,
    /// Session history for Sage when no database is configured
    pub fallback_sessions: Arc<InMemorySessionStore>,
}

impl AgentContext {
    pub fn new(
        settings: AgentSettings,
        models: Arc<dyn ModelProvider>,
        web_search: Arc<WebSearch>,
    ) -> Self {
        Self {
            settings,
            models,
            web_search,
            database: None,
            fallback_sessions: Arc::new(InMemorySessionStore::new(sage::SAGE_SESSIONS_TABLE)),
        }
    }

    pub fn with_database(mut self, database: PgDatabase) -> Self {
        self.database = Some(database);
        self
    }

    /// Bedrock models, web search and the optional database from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let web_search = WebSearch::from_api_key(config.brave_api_key.as_deref())
            .context("Failed to create web search client")?;
        info!("Web search provider: {}", web_search.provider());

        let context = Self::new(
            config.agents.clone(),
            Arc::new(BedrockProvider),
            Arc::new(web_search),
        );

        match &config.database_url {
            Some(url) => Ok(context.with_database(PgDatabase::connect(url)?)),
            None => {
                warn!("DATABASE_URL not set; session history is kept in memory");
                Ok(context)
            }
        }
    }
}

/// Context backed by a scripted model provider, replaying `script` per agent
#[cfg(test)]
pub(crate) fn test_context(
    script: Vec<crate::model::ModelTurn>,
) -> (AgentContext, Arc<crate::model::testing::ScriptedProvider>) {
    let provider = Arc::new(crate::model::testing::ScriptedProvider::new(script));
    let settings = AgentSettings {
        aws_region: "eu-west-1".to_string(),
        ..AgentSettings::default()
    };
    let context = AgentContext::new(
        settings,
        provider.clone(),
        Arc::new(WebSearch::duckduckgo().expect("web search client")),
    );
    (context, provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_type_lookup() {
        assert_eq!("sage".parse::<AgentType>().unwrap(), AgentType::Sage);
        assert_eq!("test_sage".parse::<AgentType>().unwrap(), AgentType::TestSage);
        let err = "nope".parse::<AgentType>().unwrap_err();
        assert_eq!(err.to_string(), "Agent nope not found");
        assert_eq!(available_agents(), vec!["sage", "test_sage"]);
    }

    #[tokio::test]
    async fn test_build_dispatches_by_type() {
        let (context, _) = test_context(Vec::new());
        let agent = AgentType::TestSage
            .build(&context, AgentOptions::default())
            .await
            .unwrap();
        assert_eq!(agent.agent_id(), "test_sage");
        let agent = AgentType::Sage
            .build(&context, AgentOptions::default())
            .await
            .unwrap();
        assert_eq!(agent.agent_id(), "sage");
    }
}
