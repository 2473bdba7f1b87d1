use anyhow::Result;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sage_core::api::{self, AppState};
use sage_core::{AgentContext, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "sage=debug,sage_core=debug,tower_http=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🌿 Sage starting up...");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  AWS region: {}", config.agents.aws_region);
    info!("  Default model: {}", config.agents.default_model);
    info!("  Max steps: {}", config.agents.max_steps);

    let context = AgentContext::from_config(&config)?;
    let app = api::router(AppState::new(context)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!("🌿 Sage API listening on port {}", config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutting down...");
            }
        })
        .await?;

    info!("Sage stopped");
    Ok(())
}
