//! TestSage: minimal web-search agent without storage, used for smoke testing

use anyhow::Result;
use std::sync::Arc;

use super::{AgentContext, AgentOptions, AgentType};
use crate::agent::Agent;
use crate::tools::WebSearchTool;

const TEST_SAGE_PROMPT: &str = "You are TestSage, a helpful AI assistant powered by Amazon Bedrock \
                                that can search the web for current information.";

pub fn system_message(user_id: Option<&str>) -> String {
    match user_id {
        Some(user) => format!(
            "{}\n\nYou are interacting with user: {}",
            TEST_SAGE_PROMPT, user
        ),
        None => TEST_SAGE_PROMPT.to_string(),
    }
}

pub async fn get_test_sage(ctx: &AgentContext, options: AgentOptions) -> Result<Agent> {
    let settings = &ctx.settings;
    let model_id = options
        .model_id
        .unwrap_or_else(|| settings.default_model.clone());
    let model = ctx.models.connect(&model_id, &settings.aws_region).await?;

    Ok(Agent::builder("TestSage", AgentType::TestSage.as_str(), model)
        .user_id(options.user_id.clone())
        .session_id(options.session_id)
        .region(settings.aws_region.as_str())
        .system_message(system_message(options.user_id.as_deref()))
        .tool(Arc::new(WebSearchTool::new(ctx.web_search.clone())))
        .debug_mode(options.debug_mode.unwrap_or(settings.debug_mode))
        .max_steps(settings.max_steps)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_context;

    #[tokio::test]
    async fn test_minimal_configuration() {
        let (context, provider) = test_context(Vec::new());
        let options = AgentOptions {
            user_id: Some("playground_user".to_string()),
            debug_mode: Some(false),
            ..Default::default()
        };
        let agent = get_test_sage(&context, options).await.unwrap();

        assert_eq!(agent.name(), "TestSage");
        assert_eq!(agent.model_id(), "amazon.nova-lite-v1:0");
        assert!(agent
            .system_message()
            .ends_with("\n\nYou are interacting with user: playground_user"));
        assert_eq!(
            system_message(None),
            "You are TestSage, a helpful AI assistant powered by Amazon Bedrock that can search \
             the web for current information."
        );
        assert!(agent.storage().is_none());
        assert!(agent.knowledge().is_none());
        assert_eq!(agent.tools().len(), 1);
        assert!(agent.tools().has("web_search"));
        assert!(!agent.debug_mode());
        assert_eq!(provider.connections()[0].1, "eu-west-1");
    }

    #[tokio::test]
    async fn test_session_id_generated_when_missing() {
        let (context, _) = test_context(Vec::new());
        let a = get_test_sage(&context, AgentOptions::default()).await.unwrap();
        let b = get_test_sage(&context, AgentOptions::default()).await.unwrap();
        assert_ne!(a.session_id(), b.session_id());
    }
}
