//! Live smoke test for TestSage against Amazon Bedrock
//!
//! Runs a simple query, a streamed query and, with `--web`, a streamed query
//! that needs web search. Exits non-zero on the first failure.
//!
//! Usage: cargo run --bin sage-smoke -- [--web]

use anyhow::{ensure, Context, Result};
use futures::StreamExt;
use std::io::Write;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sage_core::{Agent, AgentContext, AgentOptions, AgentType, Config};

async fn stream_to_stdout(agent: Agent, message: &str) -> Result<String> {
    let mut stream = Box::pin(agent.run_stream(message.to_string()));
    let mut content = String::new();
    let mut stdout = std::io::stdout();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        write!(stdout, "{}", chunk)?;
        stdout.flush()?;
        content.push_str(&chunk);
    }
    writeln!(stdout)?;
    Ok(content)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "sage_core=info,warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let with_web = std::env::args().any(|arg| arg == "--web");

    let config = Config::from_env()?;
    let context = AgentContext::from_config(&config)?;
    let options = AgentOptions {
        user_id: Some("playground_user".to_string()),
        ..Default::default()
    };
    let agent = AgentType::TestSage
        .build(&context, options)
        .await
        .context("Failed to create TestSage")?;
    info!(
        "Agent: {} | Model: {} | Tools: {}",
        agent.name(),
        agent.model_id(),
        agent.tools().len()
    );

    info!("Simple query");
    let response = agent
        .run("Hello! Just say 'TestSage is working' if you can see this.")
        .await
        .context("Simple query failed")?;
    ensure!(!response.content.trim().is_empty(), "Simple query returned no content");
    println!("{}", response.content);

    info!("Streaming query");
    let joke = stream_to_stdout(agent.clone(), "Tell me a very short joke")
        .await
        .context("Streaming query failed")?;
    ensure!(!joke.trim().is_empty(), "Streaming query returned no content");

    if with_web {
        info!("Web search streaming query");
        let news = stream_to_stdout(agent, "What's happening in France?")
            .await
            .context("Web search streaming query failed")?;
        ensure!(!news.trim().is_empty(), "Web search query returned no content");
    }

    info!("All smoke checks passed");
    Ok(())
}
